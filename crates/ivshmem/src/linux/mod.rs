//! Linux guest backend.

mod guest;
pub(crate) mod sysfs;

pub use guest::Guest;
pub use sysfs::list_devices;
