//! Enumeration results.

use serde::{Deserialize, Serialize};

use crate::location::PciLocation;

/// An IVSHMEM device found during enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Location of the device on the PCI bus.
    pub location: PciLocation,
    /// Human-readable description.
    pub description: String,
    /// Numeric bus address used only to order the listing.
    pub sort_key: u64,
}

impl DeviceDescriptor {
    /// Creates a new descriptor.
    #[must_use]
    pub fn new(location: PciLocation, description: impl Into<String>, sort_key: u64) -> Self {
        Self {
            location,
            description: description.into(),
            sort_key,
        }
    }
}

/// Builds a sort key from a Windows bus number and bus address.
#[must_use]
pub const fn windows_sort_key(bus_number: u32, bus_address: u32) -> u64 {
    ((bus_number as u64) << 32) | bus_address as u64
}

/// Builds a sort key from a PCI location.
///
/// Orders exactly like the (bus, device, function) triple. The domain is not
/// part of the key.
#[must_use]
pub const fn pci_sort_key(location: PciLocation) -> u64 {
    ((location.bus() as u64) << 16)
        | ((location.device() as u64) << 8)
        | location.function() as u64
}

/// Sorts enumeration results ascending by the sort key `key` extracts.
/// Ties keep enumeration order.
#[cfg_attr(not(any(target_os = "linux", windows)), allow(dead_code))]
pub(crate) fn sort_by_address<T>(items: &mut [T], key: impl Fn(&T) -> u64) {
    items.sort_by_key(key);
}
