//! Driver ABI types.

use std::ffi::c_void;
use std::ptr;

use ivshmem_constants::devices::IVSHMEM_INTERFACE_GUID;
use windows_sys::core::GUID;

use crate::config::CacheMode;

/// Interface class registered by the IVSHMEM driver.
pub(crate) const IVSHMEM_GUID: GUID = GUID::from_u128(IVSHMEM_INTERFACE_GUID);

/// `IVSHMEM_MMAP_CONFIG`, input of the mmap request.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct IvshmemMmapConfig {
    pub cache_mode: u8,
}

impl IvshmemMmapConfig {
    pub(crate) const fn new(cache_mode: CacheMode) -> Self {
        Self {
            cache_mode: cache_mode as u8,
        }
    }
}

/// `IVSHMEM_MMAP`, output of the mmap request.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct IvshmemMmap {
    pub peer_id: u16,
    pub size: u64,
    pub ptr: *mut c_void,
    pub vectors: u16,
}

impl Default for IvshmemMmap {
    fn default() -> Self {
        Self {
            peer_id: 0,
            size: 0,
            ptr: ptr::null_mut(),
            vectors: 0,
        }
    }
}
