/// Default sysfs directory listing PCI functions.
pub const PCI_DEVICES_DIR: &str = "/sys/bus/pci/devices";

/// PCI vendor id of IVSHMEM devices (Red Hat, Inc.), as printed by sysfs.
pub const IVSHMEM_VENDOR_ID: &str = "0x1af4";

/// PCI device id of IVSHMEM devices (Inter-VM shared memory), as printed by sysfs.
pub const IVSHMEM_DEVICE_ID: &str = "0x1110";

/// BAR exposing the shared memory region.
pub const IVSHMEM_SHARED_MEMORY_BAR: u8 = 2;

/// Length of a sysfs PCI function name, e.g. `0000:00:04.0`.
pub const SYSFS_NAME_LEN: usize = 12;

/// Device interface class registered by the Windows IVSHMEM driver.
pub const IVSHMEM_INTERFACE_GUID: u128 = 0xdf576976_569d_4672_95a0_f57e4ea0b210;

/// Conventional host-side backing file used by the CLI when no path is given.
pub const DEFAULT_HOST_PATH: &str = "/dev/shm/ivshmem";
