//! Resolving a device entry to an open handle on its interface path.

use std::fs::{File, OpenOptions};
use std::io;
use std::mem::{self, size_of};
use std::os::windows::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr;

use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    SP_DEVICE_INTERFACE_DATA, SP_DEVINFO_DATA, SetupDiEnumDeviceInterfaces,
    SetupDiGetDeviceInterfaceDetailW,
};
use windows_sys::Win32::Storage::FileSystem::{FILE_SHARE_READ, FILE_SHARE_WRITE};

use super::detail::{self, DetailBuffer};
use super::devinfo::DevInfoSet;
use super::ffi::IVSHMEM_GUID;
use crate::config::DetailRetry;
use crate::error::{IvshmemError, Result};

const DETAIL_OPERATION: &str = "SetupDiGetDeviceInterfaceDetailW";

/// Opens a handle on the interface of `info` and returns it with its path.
pub(crate) fn establish(
    set: &DevInfoSet,
    info: &SP_DEVINFO_DATA,
    retry: DetailRetry,
) -> Result<(File, PathBuf)> {
    let interface = first_interface(set, info)?;
    let len = probe_detail_size(set, &interface)?;
    let mut buffer = DetailBuffer::with_len(len);
    let path = PathBuf::from(fetch_detail(set, &interface, &mut buffer, retry)?);

    tracing::debug!("IVSHMEM interface path: {}", path.display());

    let device = open_device(&path)?;
    Ok((device, path))
}

/// Opens the device interface read/write, shared with other openers.
pub(crate) fn open_device(path: &Path) -> Result<File> {
    let device = OpenOptions::new()
        .read(true)
        .write(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
        .open(path)
        .map_err(IvshmemError::wrap("open device interface"))?;
    // CreateFileW's INVALID_HANDLE_VALUE already surfaces as the open error.
    Ok(device)
}

fn first_interface(set: &DevInfoSet, info: &SP_DEVINFO_DATA) -> Result<SP_DEVICE_INTERFACE_DATA> {
    // SAFETY: plain data; all-zero is a valid value.
    let mut interface: SP_DEVICE_INTERFACE_DATA = unsafe { mem::zeroed() };
    interface.cbSize = size_of::<SP_DEVICE_INTERFACE_DATA>() as u32;

    // SAFETY: `info` belongs to `set`; `interface` is a sized out parameter.
    let ok = unsafe {
        SetupDiEnumDeviceInterfaces(set.raw(), info, &IVSHMEM_GUID, 0, &mut interface)
    };
    if ok == 0 {
        return Err(IvshmemError::last_os_error("SetupDiEnumDeviceInterfaces"));
    }
    Ok(interface)
}

/// Asks for the detail size with no buffer. `ERROR_INSUFFICIENT_BUFFER` is the
/// expected outcome.
fn probe_detail_size(set: &DevInfoSet, interface: &SP_DEVICE_INTERFACE_DATA) -> Result<usize> {
    let mut required = 0u32;
    // SAFETY: a null buffer of size 0 only queries the required size.
    let ok = unsafe {
        SetupDiGetDeviceInterfaceDetailW(
            set.raw(),
            interface,
            ptr::null_mut(),
            0,
            &mut required,
            ptr::null_mut(),
        )
    };
    let outcome = if ok == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    };
    detail::probe_result(outcome, required).map_err(IvshmemError::wrap(DETAIL_OPERATION))
}

fn fetch_detail(
    set: &DevInfoSet,
    interface: &SP_DEVICE_INTERFACE_DATA,
    buffer: &mut DetailBuffer,
    retry: DetailRetry,
) -> Result<String> {
    detail::with_retry(retry, || {
        // SAFETY: the buffer carries a valid cbSize and `byte_len` bytes.
        let ok = unsafe {
            SetupDiGetDeviceInterfaceDetailW(
                set.raw(),
                interface,
                buffer.as_mut_ptr().cast(),
                buffer.byte_len(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    })
    .map_err(IvshmemError::wrap(DETAIL_OPERATION))?;

    Ok(buffer.device_path())
}
