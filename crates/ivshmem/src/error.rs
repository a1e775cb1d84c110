//! Error types for the ivshmem crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for ivshmem operations.
pub type Result<T> = std::result::Result<T, IvshmemError>;

/// Errors that can occur while discovering or mapping shared memory.
#[derive(Debug, Error)]
pub enum IvshmemError {
    /// No enumerated device matches the requested location or index.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A platform location string could not be decoded.
    #[error("invalid location format {input:?}: {reason}")]
    InvalidLocationFormat {
        /// The raw location string.
        input: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The OS handed back an unusable handle.
    #[error("invalid handle")]
    InvalidHandle,

    /// `map` was called on an endpoint that is already mapped.
    #[error("shared memory is already mapped")]
    AlreadyMapped,

    /// `unmap` was called on an endpoint that is not mapped.
    #[error("shared memory is already unmapped")]
    AlreadyUnmapped,

    /// An operation that needs a mapping was called before `map`.
    #[error("shared memory is not mapped yet")]
    NotMapped,

    /// The backing object has a size of zero.
    #[error("shared memory object {} is empty", .0.display())]
    EmptyRegion(PathBuf),

    /// A syscall, ioctl or registry query failed.
    #[error("{operation} failed: {source}")]
    OsOperationFailed {
        /// Name of the failing operation.
        operation: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl IvshmemError {
    /// Creates a new device-not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::DeviceNotFound(what.into())
    }

    /// Creates a new location-format error.
    #[must_use]
    pub fn invalid_location(input: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidLocationFormat {
            input: input.into(),
            reason,
        }
    }

    /// Wraps an I/O error with the name of the operation that produced it.
    #[must_use]
    pub fn os(operation: &'static str, source: io::Error) -> Self {
        Self::OsOperationFailed { operation, source }
    }

    /// Captures `errno` / `GetLastError` for the given operation.
    #[must_use]
    pub fn last_os_error(operation: &'static str) -> Self {
        Self::os(operation, io::Error::last_os_error())
    }

    /// Returns a closure suitable for `map_err` that wraps an I/O error.
    pub fn wrap(operation: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::os(operation, source)
    }

    /// Returns true if this is a device-not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::DeviceNotFound(_))
    }

    /// Returns the raw OS error code, if this error carries one.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::OsOperationFailed { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
