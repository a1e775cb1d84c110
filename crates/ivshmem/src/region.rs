//! Map/unmap state machine shared by every backend.
//!
//! ```text
//! Unmapped --map()--> Mapped --unmap()--> Unmapped
//! ```
//!
//! Backends only provide a [`Mapping`]; the transitions, the error on a
//! repeated transition and the panic on unmapped access live here.

use crate::error::{IvshmemError, Result};

/// Message of the panic raised when the region is touched while unmapped.
pub const UNMAPPED_ACCESS: &str = "tried to access unmapped shared memory";

/// A live mapping of a shared memory object.
pub trait Mapping {
    /// Base address of the mapping.
    fn as_ptr(&self) -> *mut u8;

    /// Length of the mapping in bytes.
    fn len(&self) -> usize;

    /// Returns true if the mapping is zero bytes long.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes writes so another mapper observes them.
    fn sync(&self) -> Result<()>;

    /// Tears the mapping down together with the handle it owns.
    fn release(self) -> Result<()>;
}

/// Runs both teardown steps of a mapping that owns `resource`.
///
/// `close` runs even when `release` fails. The first error is returned and a
/// second one is only logged.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn release_then_close<R>(
    resource: R,
    release: impl FnOnce(&R) -> Result<()>,
    close: impl FnOnce(R) -> Result<()>,
) -> Result<()> {
    let released = release(&resource);
    let closed = close(resource);

    match (released, closed) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::warn!("Closing handle after failed release: {}", close_err);
            Err(e)
        }
    }
}

/// Tracks whether an endpoint currently holds a mapping.
pub struct MapState<M: Mapping> {
    mapping: Option<M>,
}

impl<M: Mapping> MapState<M> {
    /// Creates an unmapped state.
    #[must_use]
    pub const fn new() -> Self {
        Self { mapping: None }
    }

    /// Returns whether a mapping is held.
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Returns the mapping, if any.
    #[must_use]
    pub const fn get(&self) -> Option<&M> {
        self.mapping.as_ref()
    }

    /// Transitions to `Mapped` using the mapping produced by `establish`.
    ///
    /// `establish` is not called when already mapped.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::AlreadyMapped`] if a mapping is held, or the
    /// error returned by `establish`.
    pub fn map_with(&mut self, establish: impl FnOnce() -> Result<M>) -> Result<&M> {
        if self.mapping.is_some() {
            return Err(IvshmemError::AlreadyMapped);
        }
        Ok(self.mapping.insert(establish()?))
    }

    /// Transitions to `Unmapped`, releasing the mapping.
    ///
    /// The state is `Unmapped` afterwards even if the release fails.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::AlreadyUnmapped`] if no mapping is held, or
    /// the release error.
    pub fn unmap(&mut self) -> Result<()> {
        let mapping = self.mapping.take().ok_or(IvshmemError::AlreadyUnmapped)?;
        mapping.release()
    }

    /// Flushes the mapping.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::NotMapped`] if no mapping is held.
    pub fn sync(&self) -> Result<()> {
        self.mapping.as_ref().ok_or(IvshmemError::NotMapped)?.sync()
    }

    /// Size of the mapping in bytes, 0 while unmapped.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.mapping.as_ref().map_or(0, |m| m.len() as u64)
    }

    /// Returns the mapped bytes.
    ///
    /// # Panics
    ///
    /// Panics if no mapping is held.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        let mapping = self.mapping.as_ref().expect(UNMAPPED_ACCESS);
        // SAFETY: the mapping covers `len` bytes and stays valid while it is
        // held here; the borrow of `self` keeps it from being released.
        unsafe { std::slice::from_raw_parts(mapping.as_ptr(), mapping.len()) }
    }

    /// Returns the mapped bytes for writing.
    ///
    /// # Panics
    ///
    /// Panics if no mapping is held.
    #[must_use]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let mapping = self.mapping.as_ref().expect(UNMAPPED_ACCESS);
        // SAFETY: as in `bytes`; the exclusive borrow of `self` rules out
        // other views from this process.
        unsafe { std::slice::from_raw_parts_mut(mapping.as_ptr(), mapping.len()) }
    }
}

impl<M: Mapping> Default for MapState<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Mapping> Drop for MapState<M> {
    fn drop(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            tracing::debug!("Releasing shared memory mapping on drop");
            if let Err(e) = mapping.release() {
                tracing::warn!("Failed to release shared memory on drop: {}", e);
            }
        }
    }
}
