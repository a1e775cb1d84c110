//! POSIX file-backed mapping, shared by the host endpoint and the Linux guest.

mod mmap;

pub use mmap::FileMapping;
