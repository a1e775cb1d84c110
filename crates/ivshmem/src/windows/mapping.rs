//! Shared memory mapped by the IVSHMEM driver into this process.

use std::ffi::c_void;
use std::fs::File;
use std::io;
use std::mem::size_of;
use std::os::windows::io::{AsRawHandle, IntoRawHandle};
use std::ptr;

use ivshmem_constants::ioctl::IvshmemIoctl;
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
use windows_sys::Win32::System::IO::DeviceIoControl;

use super::ffi::{IvshmemMmap, IvshmemMmapConfig};
use crate::config::CacheMode;
use crate::error::{IvshmemError, Result};
use crate::region::{Mapping, release_then_close};

/// Issues a buffered control request.
///
/// `I` and `O` must be plain `repr(C)` data; zero-sized types send no buffer.
fn control<I, O>(
    device: &File,
    request: IvshmemIoctl,
    input: &I,
    output: &mut O,
    operation: &'static str,
) -> Result<()> {
    let input_len = size_of::<I>() as u32;
    let output_len = size_of::<O>() as u32;
    let input_ptr: *const c_void = if input_len == 0 {
        ptr::null()
    } else {
        ptr::from_ref(input).cast()
    };
    let output_ptr: *mut c_void = if output_len == 0 {
        ptr::null_mut()
    } else {
        ptr::from_mut(output).cast()
    };
    let mut returned = 0u32;

    // SAFETY: both buffers are live for the call and sized by their types;
    // the handle is open for the lifetime of `device`.
    let ok = unsafe {
        DeviceIoControl(
            device.as_raw_handle() as HANDLE,
            request.code(),
            input_ptr,
            input_len,
            output_ptr,
            output_len,
            &mut returned,
            ptr::null_mut(),
        )
    };
    if ok == 0 {
        return Err(IvshmemError::last_os_error(operation));
    }
    Ok(())
}

/// Asks the driver for this VM's peer id.
pub(crate) fn request_peer_id(device: &File) -> Result<u16> {
    let mut peer_id = 0u16;
    control(
        device,
        IvshmemIoctl::RequestPeerId,
        &(),
        &mut peer_id,
        "request peer id",
    )?;
    Ok(peer_id)
}

fn close(device: File) -> Result<()> {
    let handle = device.into_raw_handle();
    // SAFETY: ownership of the handle was just taken from the `File`.
    if unsafe { CloseHandle(handle as HANDLE) } == 0 {
        return Err(IvshmemError::last_os_error("CloseHandle"));
    }
    Ok(())
}

/// A driver mapping together with the device handle that owns it.
#[derive(Debug)]
pub(crate) struct DriverMapping {
    device: File,
    ptr: *mut u8,
    len: usize,
    peer_id: u16,
    vectors: u16,
}

// SAFETY: the mapping stays valid until the release request; access through
// `&mut` is serialized by `MapState`.
unsafe impl Send for DriverMapping {}
unsafe impl Sync for DriverMapping {}

impl DriverMapping {
    /// Requests the region size and mapping from the driver.
    ///
    /// On failure the handle is handed back with the error so the caller can
    /// keep it.
    pub(crate) fn request(
        device: File,
        cache_mode: CacheMode,
    ) -> std::result::Result<Self, (File, IvshmemError)> {
        match Self::query(&device, cache_mode) {
            Ok((mmap, len)) => {
                tracing::debug!(
                    "Driver mapped {}MB at {:p} (peer {}, {} vectors)",
                    len / (1024 * 1024),
                    mmap.ptr,
                    mmap.peer_id,
                    mmap.vectors
                );
                Ok(Self {
                    device,
                    ptr: mmap.ptr.cast(),
                    len,
                    peer_id: mmap.peer_id,
                    vectors: mmap.vectors,
                })
            }
            Err(e) => Err((device, e)),
        }
    }

    fn query(device: &File, cache_mode: CacheMode) -> Result<(IvshmemMmap, usize)> {
        let mut size = 0u64;
        control(
            device,
            IvshmemIoctl::RequestSize,
            &(),
            &mut size,
            "request shared memory size",
        )?;

        let mut mmap = IvshmemMmap::default();
        control(
            device,
            IvshmemIoctl::RequestMmap,
            &IvshmemMmapConfig::new(cache_mode),
            &mut mmap,
            "request shared memory mapping",
        )?;

        if mmap.ptr.is_null() {
            return Err(IvshmemError::os(
                "request shared memory mapping",
                io::Error::other("driver returned a null mapping"),
            ));
        }
        let len = usize::try_from(size).map_err(|_| {
            IvshmemError::os(
                "request shared memory size",
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "region does not fit in the address space",
                ),
            )
        })?;

        Ok((mmap, len))
    }

    pub(crate) const fn device(&self) -> &File {
        &self.device
    }

    pub(crate) const fn peer_id(&self) -> u16 {
        self.peer_id
    }

    pub(crate) const fn vectors(&self) -> u16 {
        self.vectors
    }
}

impl Mapping for DriverMapping {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }

    fn sync(&self) -> Result<()> {
        self.device
            .sync_all()
            .map_err(IvshmemError::wrap("FlushFileBuffers"))
    }

    fn release(self) -> Result<()> {
        let len = self.len;
        release_then_close(
            self.device,
            |device| {
                control(
                    device,
                    IvshmemIoctl::ReleaseMmap,
                    &(),
                    &mut (),
                    "release shared memory mapping",
                )
            },
            close,
        )?;
        tracing::debug!("Released driver mapping of {} bytes", len);
        Ok(())
    }
}
