//! Guest endpoint backed by the Windows IVSHMEM driver.

use std::fs::File;
use std::path::{Path, PathBuf};

use super::devinfo::{DevInfoSet, DeviceEntry};
use super::interface::{self, open_device};
use super::mapping::{self, DriverMapping};
use crate::config::{CacheMode, GuestConfig};
use crate::device::DeviceDescriptor;
use crate::error::{IvshmemError, Result};
use crate::location::PciLocation;
use crate::region::MapState;
use crate::traits::SharedMemory;

/// An IVSHMEM PCI device seen from inside a Windows VM.
///
/// The device handle is opened at construction. Mapping hands it to the
/// driver mapping, unmapping closes it, and a later `map` reopens the
/// interface path.
pub struct Guest {
    device: DeviceDescriptor,
    dev_path: PathBuf,
    handle: Option<File>,
    cache_mode: CacheMode,
    state: MapState<DriverMapping>,
}

impl Guest {
    /// Opens the device at `location` using the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::DeviceNotFound`] if no IVSHMEM device sits at
    /// `location`, or the error raised while opening its handle.
    pub fn new(location: PciLocation) -> Result<Self> {
        Self::with_config(location, &GuestConfig::default())
    }

    /// Opens the device at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::DeviceNotFound`] if no IVSHMEM device sits at
    /// `location`, or the error raised while opening its handle.
    pub fn with_config(location: PciLocation, config: &GuestConfig) -> Result<Self> {
        let set = DevInfoSet::open()?;
        let entry = set
            .entries(config.fault_policy)?
            .into_iter()
            .find(|e| e.descriptor.location == location)
            .ok_or_else(|| IvshmemError::not_found(location.to_string()))?;
        Self::establish(&set, entry, config)
    }

    /// Opens the `index`-th device of the ordered listing.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::DeviceNotFound`] if the listing is shorter
    /// than `index + 1`, or the error raised while opening its handle.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::from_index_with(index, &GuestConfig::default())
    }

    /// Opens the `index`-th device of the listing produced by `config`.
    ///
    /// # Errors
    ///
    /// Same as [`Guest::from_index`].
    pub fn from_index_with(index: usize, config: &GuestConfig) -> Result<Self> {
        let set = DevInfoSet::open()?;
        let entry = set
            .entries(config.fault_policy)?
            .into_iter()
            .nth(index)
            .ok_or_else(|| IvshmemError::not_found(format!("device index {index}")))?;
        Self::establish(&set, entry, config)
    }

    fn establish(set: &DevInfoSet, entry: DeviceEntry, config: &GuestConfig) -> Result<Self> {
        let (handle, dev_path) = interface::establish(set, &entry.info, config.detail_retry)?;

        tracing::debug!(
            "Selected IVSHMEM device {} ({})",
            entry.descriptor.location,
            entry.descriptor.description
        );

        Ok(Self {
            device: entry.descriptor,
            dev_path,
            handle: Some(handle),
            cache_mode: config.cache_mode,
            state: MapState::new(),
        })
    }

    /// Location of the device.
    #[must_use]
    pub const fn location(&self) -> PciLocation {
        self.device.location
    }

    /// Description reported by the device registry.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.device.description
    }

    /// Descriptor the device was opened from.
    #[must_use]
    pub const fn descriptor(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Name of the platform backend.
    #[must_use]
    pub const fn system(&self) -> &'static str {
        "Windows"
    }

    /// Peer id reported with the current mapping.
    #[must_use]
    pub fn peer_id(&self) -> Option<u16> {
        self.state.get().map(DriverMapping::peer_id)
    }

    /// Interrupt vector count reported with the current mapping.
    #[must_use]
    pub fn vectors(&self) -> Option<u16> {
        self.state.get().map(DriverMapping::vectors)
    }

    /// Asks the driver for this VM's peer id, mapped or not.
    ///
    /// # Errors
    ///
    /// Returns the error of the control request or of reopening the device.
    pub fn request_peer_id(&self) -> Result<u16> {
        match (self.state.get(), &self.handle) {
            (Some(mapping), _) => mapping::request_peer_id(mapping.device()),
            (None, Some(handle)) => mapping::request_peer_id(handle),
            (None, None) => mapping::request_peer_id(&open_device(&self.dev_path)?),
        }
    }
}

impl SharedMemory for Guest {
    fn map(&mut self) -> Result<()> {
        let handle = &mut self.handle;
        let path = &self.dev_path;
        let cache_mode = self.cache_mode;

        self.state.map_with(|| {
            let device = match handle.take() {
                Some(device) => device,
                None => open_device(path)?,
            };
            DriverMapping::request(device, cache_mode).map_err(|(device, e)| {
                *handle = Some(device);
                e
            })
        })?;
        Ok(())
    }

    fn unmap(&mut self) -> Result<()> {
        self.state.unmap()
    }

    fn sync(&self) -> Result<()> {
        self.state.sync()
    }

    fn is_mapped(&self) -> bool {
        self.state.is_mapped()
    }

    fn size(&self) -> u64 {
        self.state.size()
    }

    fn dev_path(&self) -> &Path {
        &self.dev_path
    }

    fn shared_mem(&self) -> &[u8] {
        self.state.bytes()
    }

    fn shared_mem_mut(&mut self) -> &mut [u8] {
        self.state.bytes_mut()
    }
}

impl std::fmt::Debug for Guest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guest")
            .field("location", &self.device.location)
            .field("dev_path", &self.dev_path)
            .field("mapped", &self.state.is_mapped())
            .field("peer_id", &self.peer_id())
            .finish()
    }
}
