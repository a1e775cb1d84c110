/// Environment variable overriding the sysfs PCI devices directory.
pub const PCI_ROOT: &str = "IVSHMEM_PCI_ROOT";

/// Environment variable naming the default host backing file for the CLI.
pub const HOST_PATH: &str = "IVSHMEM_HOST_PATH";
