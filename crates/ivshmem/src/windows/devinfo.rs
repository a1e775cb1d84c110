//! Device-information sets for the IVSHMEM interface class.

use std::io;
use std::mem::{self, size_of};
use std::ptr;

use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO, SP_DEVINFO_DATA, SPDRP_ADDRESS,
    SPDRP_BUSNUMBER, SPDRP_DEVICEDESC, SPDRP_LOCATION_INFORMATION, SetupDiDestroyDeviceInfoList,
    SetupDiEnumDeviceInfo, SetupDiGetClassDevsW, SetupDiGetDeviceRegistryPropertyW,
};
use windows_sys::Win32::Foundation::{
    ERROR_INSUFFICIENT_BUFFER, ERROR_NO_MORE_ITEMS, INVALID_HANDLE_VALUE,
};

use super::detail::decode_wide;
use super::ffi::IVSHMEM_GUID;
use crate::config::{FaultPolicy, GuestConfig};
use crate::device::{DeviceDescriptor, sort_by_address, windows_sort_key};
use crate::error::{IvshmemError, Result};
use crate::location::{LocationDialect, PciLocation};

/// A present device of the IVSHMEM interface class.
pub(crate) struct DeviceEntry {
    pub info: SP_DEVINFO_DATA,
    pub descriptor: DeviceDescriptor,
}

/// Owned `HDEVINFO`, destroyed on drop.
pub(crate) struct DevInfoSet {
    handle: HDEVINFO,
}

impl DevInfoSet {
    /// Opens the set of present IVSHMEM devices.
    pub(crate) fn open() -> Result<Self> {
        // SAFETY: the GUID is a valid static; null enumerator and parent
        // window are accepted.
        let handle = unsafe {
            SetupDiGetClassDevsW(
                &IVSHMEM_GUID,
                ptr::null(),
                ptr::null_mut(),
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            )
        };
        if handle as isize == INVALID_HANDLE_VALUE as isize {
            tracing::debug!(
                "SetupDiGetClassDevsW returned an invalid handle: {}",
                io::Error::last_os_error()
            );
            return Err(IvshmemError::InvalidHandle);
        }
        Ok(Self { handle })
    }

    pub(crate) const fn raw(&self) -> HDEVINFO {
        self.handle
    }

    /// Describes every device in the set, ordered by bus address.
    pub(crate) fn entries(&self, policy: FaultPolicy) -> Result<Vec<DeviceEntry>> {
        let mut entries = Vec::new();
        let mut index = 0;

        loop {
            // SAFETY: SP_DEVINFO_DATA is plain data; all-zero is a valid value.
            let mut info: SP_DEVINFO_DATA = unsafe { mem::zeroed() };
            info.cbSize = size_of::<SP_DEVINFO_DATA>() as u32;

            // SAFETY: `info` is a correctly sized out parameter.
            if unsafe { SetupDiEnumDeviceInfo(self.handle, index, &mut info) } == 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(ERROR_NO_MORE_ITEMS as i32) {
                    break;
                }
                return Err(IvshmemError::os("SetupDiEnumDeviceInfo", err));
            }
            index += 1;

            match self.describe(&info) {
                Ok(descriptor) => entries.push(DeviceEntry { info, descriptor }),
                Err(e) => match policy {
                    FaultPolicy::SkipDevice => {
                        tracing::warn!("Skipping IVSHMEM device #{}: {}", index - 1, e);
                    }
                    FaultPolicy::Abort => return Err(e),
                },
            }
        }

        sort_by_address(&mut entries, |e| e.descriptor.sort_key);

        tracing::debug!("Found {} IVSHMEM device(s)", entries.len());

        Ok(entries)
    }

    fn describe(&self, info: &SP_DEVINFO_DATA) -> Result<DeviceDescriptor> {
        let bus_number = self.property_u32(info, SPDRP_BUSNUMBER, "read device bus number")?;
        let bus_address = self.property_u32(info, SPDRP_ADDRESS, "read device bus address")?;
        let description = self.property_string(info, SPDRP_DEVICEDESC, "read device description")?;
        let raw_location =
            self.property_string(info, SPDRP_LOCATION_INFORMATION, "read device location")?;
        let location = PciLocation::parse(&raw_location, LocationDialect::WindowsRegistryText)?;

        Ok(DeviceDescriptor::new(
            location,
            description,
            windows_sort_key(bus_number, bus_address),
        ))
    }

    fn property_u32(
        &self,
        info: &SP_DEVINFO_DATA,
        property: u32,
        operation: &'static str,
    ) -> Result<u32> {
        let mut value = 0u32;
        // SAFETY: the buffer is a live u32 and its size is passed along.
        let ok = unsafe {
            SetupDiGetDeviceRegistryPropertyW(
                self.handle,
                info,
                property,
                ptr::null_mut(),
                ptr::from_mut(&mut value).cast(),
                size_of::<u32>() as u32,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(IvshmemError::last_os_error(operation));
        }
        Ok(value)
    }

    fn property_string(
        &self,
        info: &SP_DEVINFO_DATA,
        property: u32,
        operation: &'static str,
    ) -> Result<String> {
        let mut required = 0u32;
        // SAFETY: a null buffer of size 0 only queries the required size.
        let ok = unsafe {
            SetupDiGetDeviceRegistryPropertyW(
                self.handle,
                info,
                property,
                ptr::null_mut(),
                ptr::null_mut(),
                0,
                &mut required,
            )
        };
        if ok == 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(ERROR_INSUFFICIENT_BUFFER as i32) {
                return Err(IvshmemError::os(operation, err));
            }
        }

        let mut buffer = vec![0u16; (required as usize).div_ceil(2)];
        // SAFETY: the buffer holds `required` bytes.
        let ok = unsafe {
            SetupDiGetDeviceRegistryPropertyW(
                self.handle,
                info,
                property,
                ptr::null_mut(),
                buffer.as_mut_ptr().cast(),
                (buffer.len() * 2) as u32,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(IvshmemError::last_os_error(operation));
        }

        Ok(decode_wide(buffer))
    }
}

impl Drop for DevInfoSet {
    fn drop(&mut self) {
        // SAFETY: the handle came from SetupDiGetClassDevsW and is destroyed once.
        if unsafe { SetupDiDestroyDeviceInfoList(self.handle) } == 0 {
            tracing::warn!(
                "SetupDiDestroyDeviceInfoList failed: {}",
                io::Error::last_os_error()
            );
        }
    }
}

/// Lists IVSHMEM devices known to the driver, ordered by bus address.
///
/// # Errors
///
/// Returns an error if the device set cannot be opened or enumerated, or if a
/// device cannot be described under [`FaultPolicy::Abort`].
pub fn list_devices(config: &GuestConfig) -> Result<Vec<DeviceDescriptor>> {
    let set = DevInfoSet::open()?;
    Ok(set
        .entries(config.fault_policy)?
        .into_iter()
        .map(|e| e.descriptor)
        .collect())
}
