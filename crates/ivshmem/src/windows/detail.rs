//! `SP_DEVICE_INTERFACE_DETAIL_DATA_W` buffer handling.
//!
//! The structure is a `DWORD cbSize` followed by a NUL-terminated UTF-16
//! device path filling the rest of the allocation.

use std::ffi::c_void;
use std::io;
use std::thread;

use windows_sys::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, ERROR_INVALID_PARAMETER};

use crate::config::DetailRetry;

/// Value `cbSize` must hold for a given pointer width: the fixed part of the
/// structure, padded to pointer alignment on 64-bit targets.
pub(crate) const fn cb_size_for_pointer_width(bits: u32) -> u32 {
    if bits == 64 { 8 } else { 6 }
}

/// `cbSize` for the current target.
pub(crate) const DETAIL_CB_SIZE: u32 = cb_size_for_pointer_width(usize::BITS);

/// Code units taken by the `cbSize` header.
const HEADER_UNITS: usize = 2;

/// Caller-allocated output buffer for the second detail query.
///
/// Backed by `u32` words so the `cbSize` header is properly aligned.
#[derive(Debug)]
pub(crate) struct DetailBuffer {
    words: Vec<u32>,
    len: usize,
}

impl DetailBuffer {
    /// Allocates `len` bytes, as reported by the size probe.
    pub(crate) fn with_len(len: usize) -> Self {
        let mut words = vec![0u32; len.div_ceil(4).max(1)];
        words[0] = DETAIL_CB_SIZE;
        Self { words, len }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut c_void {
        self.words.as_mut_ptr().cast()
    }

    /// Size in bytes handed to the OS.
    pub(crate) fn byte_len(&self) -> u32 {
        u32::try_from(self.len).unwrap_or(u32::MAX)
    }

    /// UTF-16 code units after the header, bounded by the reported length.
    fn path_units(&self) -> impl Iterator<Item = u16> + '_ {
        self.words
            .iter()
            .flat_map(|w| [*w as u16, (*w >> 16) as u16])
            .take(self.len / 2)
            .skip(HEADER_UNITS)
    }

    /// Decodes the device path written by the OS.
    pub(crate) fn device_path(&self) -> String {
        decode_wide(self.path_units())
    }
}

/// Decodes UTF-16 up to the first NUL or the end of input.
pub(crate) fn decode_wide(units: impl IntoIterator<Item = u16>) -> String {
    let units: Vec<u16> = units.into_iter().take_while(|&u| u != 0).collect();
    String::from_utf16_lossy(&units)
}

/// Interprets the size probe, which passes no buffer.
///
/// `ERROR_INSUFFICIENT_BUFFER` is the expected outcome and yields `required`.
/// Any other error is returned as is, and success is an error too.
pub(crate) fn probe_result(outcome: io::Result<()>, required: u32) -> io::Result<usize> {
    match outcome {
        Ok(()) => Err(io::Error::other("size probe succeeded without a buffer")),
        Err(e) if e.raw_os_error() == Some(ERROR_INSUFFICIENT_BUFFER as i32) => {
            Ok(required as usize)
        }
        Err(e) => Err(e),
    }
}

fn is_spurious(err: &io::Error) -> bool {
    err.raw_os_error() == Some(ERROR_INVALID_PARAMETER as i32)
}

/// Runs `query`, retrying only on `ERROR_INVALID_PARAMETER` as allowed by
/// `retry`. The last error is returned once attempts run out.
pub(crate) fn with_retry<T>(
    retry: DetailRetry,
    mut query: impl FnMut() -> io::Result<T>,
) -> io::Result<T> {
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match query() {
            Ok(value) => return Ok(value),
            Err(e) if is_spurious(&e) && attempt < attempts => {
                tracing::debug!(
                    "Interface detail query attempt {}/{} failed: {}",
                    attempt,
                    attempts,
                    e
                );
                attempt += 1;
                thread::sleep(retry.delay);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn fill(buffer: &mut DetailBuffer, path: &str) {
        let units: Vec<u16> = path.encode_utf16().chain(Some(0)).collect();
        let base = buffer.as_mut_ptr().cast::<u16>();
        for (i, unit) in units.iter().enumerate() {
            // SAFETY: tests size the buffer for the path and its terminator.
            unsafe { base.add(HEADER_UNITS + i).write(*unit) };
        }
    }

    #[test]
    fn test_cb_size() {
        assert_eq!(cb_size_for_pointer_width(64), 8);
        assert_eq!(cb_size_for_pointer_width(32), 6);
    }

    #[test]
    fn test_buffer_header() {
        let buffer = DetailBuffer::with_len(10);
        assert_eq!(buffer.words[0], DETAIL_CB_SIZE);
        assert_eq!(buffer.byte_len(), 10);
    }

    #[test]
    fn test_decodes_path_after_header() {
        let path = r"\\?\pci#ven_1af4&dev_1110#3&267a616a&0&20#{df576976}";
        let len = 4 + (path.len() + 1) * 2;
        let mut buffer = DetailBuffer::with_len(len);
        fill(&mut buffer, path);
        assert_eq!(buffer.device_path(), path);
    }

    #[test]
    fn test_decode_bounded_without_nul() {
        let mut buffer = DetailBuffer::with_len(4 + 3 * 2);
        fill(&mut buffer, "abcdef");
        assert_eq!(buffer.device_path(), "abc");
    }

    #[test]
    fn test_decode_wide() {
        let units = [0x0041, 0x0042, 0, 0x0043];
        assert_eq!(decode_wide(units), "AB");
        assert_eq!(decode_wide([]), "");
    }

    #[test]
    fn test_probe_insufficient_buffer_yields_size() {
        let outcome = Err(io::Error::from_raw_os_error(ERROR_INSUFFICIENT_BUFFER as i32));
        assert_eq!(probe_result(outcome, 164).unwrap(), 164);
    }

    #[test]
    fn test_probe_other_error_is_fatal() {
        let outcome = Err(io::Error::from_raw_os_error(ERROR_INVALID_PARAMETER as i32));
        let err = probe_result(outcome, 164).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ERROR_INVALID_PARAMETER as i32));
    }

    #[test]
    fn test_probe_success_is_an_error() {
        let err = probe_result(Ok(()), 164).unwrap_err();
        assert!(err.to_string().contains("without a buffer"));
    }

    #[test]
    fn test_retry_recovers_from_spurious_error() {
        let mut calls = 0;
        let retry = DetailRetry {
            attempts: 5,
            delay: Duration::ZERO,
        };
        let value = with_retry(retry, || {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from_raw_os_error(ERROR_INVALID_PARAMETER as i32))
            } else {
                Ok(42)
            }
        })
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_gives_up_after_attempts() {
        let mut calls = 0;
        let retry = DetailRetry {
            attempts: 3,
            delay: Duration::ZERO,
        };
        let err = with_retry::<()>(retry, || {
            calls += 1;
            Err(io::Error::from_raw_os_error(ERROR_INVALID_PARAMETER as i32))
        })
        .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(ERROR_INVALID_PARAMETER as i32));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_ignores_other_errors() {
        let mut calls = 0;
        let retry = DetailRetry::default();
        let err = with_retry::<()>(retry, || {
            calls += 1;
            Err(io::Error::from_raw_os_error(5))
        })
        .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(5));
        assert_eq!(calls, 1);
    }
}
