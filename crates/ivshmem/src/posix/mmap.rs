//! Shared `mmap` of a file or PCI resource.

use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr;

use crate::error::{IvshmemError, Result};
use crate::region::Mapping;

/// A `MAP_SHARED` read/write mapping of an entire file.
///
/// The file descriptor is closed as soon as the mapping exists; the mapping
/// keeps the object alive on its own.
#[derive(Debug)]
pub struct FileMapping {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the mapping is process-wide memory valid until `release`; access
// through `&mut` is serialized by `MapState`.
unsafe impl Send for FileMapping {}
unsafe impl Sync for FileMapping {}

impl FileMapping {
    /// Maps the whole of `path` read/write.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::EmptyRegion`] for a zero-length object, or an
    /// OS error naming the failing step.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(IvshmemError::wrap("open shared memory file"))?;

        let size = file
            .metadata()
            .map_err(IvshmemError::wrap("stat shared memory file"))?
            .len();
        if size == 0 {
            return Err(IvshmemError::EmptyRegion(path.to_path_buf()));
        }
        let len = usize::try_from(size).map_err(|_| {
            IvshmemError::os(
                "mmap",
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "object does not fit in the address space",
                ),
            )
        })?;

        // SAFETY: mapping a file we hold open; the result is checked below.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(IvshmemError::last_os_error("mmap"));
        }

        tracing::debug!(
            "Mapped {} ({}MB) at {:p}",
            path.display(),
            size / (1024 * 1024),
            ptr
        );

        Ok(Self {
            ptr: ptr.cast::<u8>(),
            len,
        })
    }
}

impl Mapping for FileMapping {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }

    fn sync(&self) -> Result<()> {
        // SAFETY: the range is exactly the live mapping.
        let ret = unsafe { libc::msync(self.ptr.cast(), self.len, libc::MS_SYNC) };
        if ret != 0 {
            return Err(IvshmemError::last_os_error("msync"));
        }
        Ok(())
    }

    fn release(self) -> Result<()> {
        // SAFETY: unmapping exactly what `open` mapped; `self` is consumed so
        // the range cannot be used again through this value.
        let ret = unsafe { libc::munmap(self.ptr.cast(), self.len) };
        if ret != 0 {
            return Err(IvshmemError::last_os_error("munmap"));
        }
        tracing::debug!("Unmapped {} bytes at {:p}", self.len, self.ptr);
        Ok(())
    }
}
