//! # ivshmem
//!
//! Discover and map IVSHMEM (inter-VM shared memory) regions.
//!
//! Two endpoints share one region:
//! - [`Host`]: the hypervisor's backing file on the VM host (unix)
//! - [`Guest`]: the IVSHMEM PCI device inside a VM
//!
//! Both implement [`SharedMemory`], which enforces a simple
//! `Unmapped -> Mapped -> Unmapped` lifecycle.
//!
//! ## Platform Backends
//!
//! - **Linux**: sysfs enumeration and `mmap` of the BAR resource file
//! - **Windows**: setupapi enumeration and the IVSHMEM driver's mmap request
//!
//! ## Example
//!
//! ```ignore
//! use ivshmem::{Guest, SharedMemory, list_devices};
//!
//! let devices = list_devices()?;
//! let mut guest = Guest::new(devices[0].location)?;
//! guest.map()?;
//! guest.shared_mem_mut()[..5].copy_from_slice(b"hello");
//! guest.sync()?;
//! guest.unmap()?;
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
// FFI bindings require extensive pointer casts.
#![allow(clippy::ptr_as_ptr)]
#![allow(clippy::borrow_as_ptr)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
// Documentation and style lints.
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unreadable_literal)]

pub mod config;
pub mod device;
pub mod error;
pub mod location;
pub mod region;
pub mod traits;

#[cfg(unix)]
mod host;
#[cfg(unix)]
mod posix;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(windows)]
pub mod windows;

pub use config::{CacheMode, DetailRetry, FaultPolicy, GuestConfig, GuestConfigBuilder};
pub use device::DeviceDescriptor;
pub use error::{IvshmemError, Result};
pub use location::{LocationDialect, PciLocation};
pub use traits::SharedMemory;

#[cfg(unix)]
pub use host::Host;

#[cfg(target_os = "linux")]
pub use linux::Guest;

#[cfg(windows)]
pub use windows::Guest;

/// Name of the guest backend compiled into this build.
pub const SYSTEM: &str = if cfg!(target_os = "linux") {
    "Linux"
} else if cfg!(windows) {
    "Windows"
} else {
    "unsupported"
};

/// Lists IVSHMEM devices visible to this guest, ordered by bus address.
///
/// # Errors
///
/// Returns an error if enumeration fails.
pub fn list_devices() -> Result<Vec<DeviceDescriptor>> {
    list_devices_with(&GuestConfig::default())
}

/// Lists IVSHMEM devices using the given configuration.
///
/// # Errors
///
/// Returns an error if enumeration fails, or if a device cannot be inspected
/// under [`FaultPolicy::Abort`].
pub fn list_devices_with(config: &GuestConfig) -> Result<Vec<DeviceDescriptor>> {
    #[cfg(target_os = "linux")]
    {
        linux::list_devices(config)
    }

    #[cfg(windows)]
    {
        windows::list_devices(config)
    }

    #[cfg(not(any(target_os = "linux", windows)))]
    {
        let _ = config;
        Err(IvshmemError::os(
            "list devices",
            std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "no IVSHMEM guest backend for this platform",
            ),
        ))
    }
}
