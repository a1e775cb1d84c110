//! The accessor set shared by host and guest endpoints.

use std::path::Path;

use crate::error::Result;

/// An endpoint owning at most one mapping of a shared memory object.
///
/// Implemented by [`Host`](crate::Host) and by each platform's
/// [`Guest`](crate::Guest).
pub trait SharedMemory {
    /// Maps the shared memory into the process.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyMapped`](crate::IvshmemError::AlreadyMapped) if a
    /// mapping is held, or the OS error that prevented the mapping.
    fn map(&mut self) -> Result<()>;

    /// Releases the mapping and the handle backing it.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyUnmapped`](crate::IvshmemError::AlreadyUnmapped) if
    /// nothing is mapped, or the OS error raised during release.
    fn unmap(&mut self) -> Result<()>;

    /// Flushes writes so that another mapper of the object observes them.
    ///
    /// # Errors
    ///
    /// Returns [`NotMapped`](crate::IvshmemError::NotMapped) before `map`.
    fn sync(&self) -> Result<()>;

    /// Returns whether a mapping is held.
    fn is_mapped(&self) -> bool;

    /// Size of the mapped region in bytes, 0 while unmapped.
    fn size(&self) -> u64;

    /// Path of the device or file backing the region.
    fn dev_path(&self) -> &Path;

    /// The mapped region.
    ///
    /// # Panics
    ///
    /// Panics if called while unmapped.
    fn shared_mem(&self) -> &[u8];

    /// The mapped region, writable.
    ///
    /// # Panics
    ///
    /// Panics if called while unmapped.
    fn shared_mem_mut(&mut self) -> &mut [u8];
}
