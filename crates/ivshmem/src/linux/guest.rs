//! Guest endpoint mapping a BAR through its sysfs resource file.

use std::path::{Path, PathBuf};

use crate::config::GuestConfig;
use crate::device::DeviceDescriptor;
use crate::error::{IvshmemError, Result};
use crate::linux::sysfs::{self, SysfsDevice};
use crate::location::PciLocation;
use crate::posix::FileMapping;
use crate::region::MapState;
use crate::traits::SharedMemory;

/// An IVSHMEM PCI device seen from inside a Linux VM.
pub struct Guest {
    device: DeviceDescriptor,
    dev_path: PathBuf,
    state: MapState<FileMapping>,
}

impl Guest {
    /// Opens the device at `location` using the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::DeviceNotFound`] if no IVSHMEM device sits at
    /// `location`, or an enumeration error.
    pub fn new(location: PciLocation) -> Result<Self> {
        Self::with_config(location, &GuestConfig::default())
    }

    /// Opens the device at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::DeviceNotFound`] if no IVSHMEM device sits at
    /// `location`, or an enumeration error.
    pub fn with_config(location: PciLocation, config: &GuestConfig) -> Result<Self> {
        let device = sysfs::scan(config)?
            .into_iter()
            .find(|d| d.descriptor.location == location)
            .ok_or_else(|| IvshmemError::not_found(location.to_string()))?;
        Ok(Self::from_sysfs(device, config))
    }

    /// Opens the `index`-th device of the ordered listing.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::DeviceNotFound`] if the listing is shorter
    /// than `index + 1`, or an enumeration error.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::from_index_with(index, &GuestConfig::default())
    }

    /// Opens the `index`-th device of the listing produced by `config`.
    ///
    /// # Errors
    ///
    /// Same as [`Guest::from_index`].
    pub fn from_index_with(index: usize, config: &GuestConfig) -> Result<Self> {
        let device = sysfs::scan(config)?
            .into_iter()
            .nth(index)
            .ok_or_else(|| IvshmemError::not_found(format!("device index {index}")))?;
        Ok(Self::from_sysfs(device, config))
    }

    fn from_sysfs(device: SysfsDevice, config: &GuestConfig) -> Self {
        let dev_path = config
            .pci_root
            .join(&device.name)
            .join(config.resource_file());

        tracing::debug!(
            "Selected IVSHMEM device {} ({})",
            device.descriptor.location,
            dev_path.display()
        );

        Self {
            device: device.descriptor,
            dev_path,
            state: MapState::new(),
        }
    }

    /// Location of the device.
    #[must_use]
    pub const fn location(&self) -> PciLocation {
        self.device.location
    }

    /// Description of the device, its sysfs directory name.
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
        "Linux"
    }
}

impl SharedMemory for Guest {
    fn map(&mut self) -> Result<()> {
        let path = &self.dev_path;
        self.state.map_with(|| FileMapping::open(path))?;
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
            .finish()
    }
}
