//! Windows guest backend over setupapi and the IVSHMEM driver.

mod detail;
mod devinfo;
mod ffi;
mod guest;
mod interface;
mod mapping;

pub use devinfo::list_devices;
pub use guest::Guest;
