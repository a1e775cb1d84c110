//! IVSHMEM discovery through `/sys/bus/pci/devices`.

use std::fs;
use std::path::Path;

use ivshmem_constants::devices::SYSFS_NAME_LEN;

use crate::config::{FaultPolicy, GuestConfig};
use crate::device::{DeviceDescriptor, pci_sort_key, sort_by_address};
use crate::error::{IvshmemError, Result};
use crate::location::{LocationDialect, PciLocation};

/// A matching PCI function together with its sysfs directory name.
#[derive(Debug, Clone)]
pub(crate) struct SysfsDevice {
    pub name: String,
    pub descriptor: DeviceDescriptor,
}

/// Lists IVSHMEM devices under the configured PCI root, ordered by address.
///
/// # Errors
///
/// Returns an error if the directory cannot be read, or if a device cannot be
/// inspected under [`FaultPolicy::Abort`].
pub fn list_devices(config: &GuestConfig) -> Result<Vec<DeviceDescriptor>> {
    Ok(scan(config)?.into_iter().map(|d| d.descriptor).collect())
}

/// Returns true for names shaped like `0000:00:04.0`.
fn is_pci_name(name: &str) -> bool {
    name.len() == SYSFS_NAME_LEN && name.split(':').count() == 3
}

fn read_id(dir: &Path, file: &str, operation: &'static str) -> Result<String> {
    fs::read_to_string(dir.join(file))
        .map(|s| s.trim().to_string())
        .map_err(IvshmemError::wrap(operation))
}

/// Inspects one candidate; `Ok(None)` means it is not an IVSHMEM device.
fn inspect(config: &GuestConfig, name: &str) -> Result<Option<SysfsDevice>> {
    let dir = config.pci_root.join(name);

    if read_id(&dir, "vendor", "read PCI vendor id")? != config.vendor_id {
        return Ok(None);
    }
    if read_id(&dir, "device", "read PCI device id")? != config.device_id {
        return Ok(None);
    }

    let location = PciLocation::parse(name, LocationDialect::SysfsDirName)?;

    Ok(Some(SysfsDevice {
        name: name.to_string(),
        descriptor: DeviceDescriptor::new(location, name, pci_sort_key(location)),
    }))
}

/// Walks the PCI root and returns the matching devices, ordered by address.
pub(crate) fn scan(config: &GuestConfig) -> Result<Vec<SysfsDevice>> {
    let entries =
        fs::read_dir(&config.pci_root).map_err(IvshmemError::wrap("read PCI devices directory"))?;

    let mut devices = Vec::new();
    for entry in entries {
        let entry = entry.map_err(IvshmemError::wrap("read PCI devices directory"))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_pci_name(&name) {
            continue;
        }

        match inspect(config, &name) {
            Ok(Some(device)) => devices.push(device),
            Ok(None) => {}
            Err(e) => match config.fault_policy {
                FaultPolicy::SkipDevice => {
                    tracing::warn!("Skipping PCI device {}: {}", name, e);
                }
                FaultPolicy::Abort => return Err(e),
            },
        }
    }

    // read_dir order is unspecified; sort for a stable listing.
    sort_by_address(&mut devices, |d| d.descriptor.sort_key);

    tracing::debug!(
        "Found {} IVSHMEM device(s) under {}",
        devices.len(),
        config.pci_root.display()
    );

    Ok(devices)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::Path;

    use super::*;

    /// Creates a fake sysfs PCI function directory.
    pub(crate) fn fake_function(root: &Path, name: &str, vendor: &str, device: &str, bar_len: u64) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vendor"), format!("{vendor}\n")).unwrap();
        fs::write(dir.join("device"), format!("{device}\n")).unwrap();
        let bar = fs::File::create(dir.join("resource2")).unwrap();
        bar.set_len(bar_len).unwrap();
    }

    fn config(root: &Path) -> GuestConfig {
        GuestConfig::builder().pci_root(root).build()
    }

    #[test]
    fn test_is_pci_name() {
        assert!(is_pci_name("0000:00:04.0"));
        assert!(!is_pci_name("0000:00:04"));
        assert!(!is_pci_name("0000:00:04:0"));
        assert!(!is_pci_name("0000:00:04.10"));
    }

    #[test]
    fn test_filters_by_vendor_and_device() {
        let root = tempfile::tempdir().unwrap();
        fake_function(root.path(), "0000:00:04.0", "0x1af4", "0x1110", 4096);
        fake_function(root.path(), "0000:00:03.0", "0x1af4", "0x1000", 4096);
        fake_function(root.path(), "0000:00:02.0", "0x8086", "0x1110", 4096);

        let devices = list_devices(&config(root.path())).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].location, PciLocation::new(0, 4, 0));
        assert_eq!(devices[0].description, "0000:00:04.0");
    }

    #[test]
    fn test_ignores_non_pci_entries() {
        let root = tempfile::tempdir().unwrap();
        fake_function(root.path(), "0000:00:04.0", "0x1af4", "0x1110", 4096);
        fs::create_dir(root.path().join("not-a-device")).unwrap();
        fs::write(root.path().join("uevent"), "").unwrap();

        let devices = list_devices(&config(root.path())).unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_sorted_by_address() {
        let root = tempfile::tempdir().unwrap();
        fake_function(root.path(), "0000:01:00.0", "0x1af4", "0x1110", 4096);
        fake_function(root.path(), "0000:00:05.1", "0x1af4", "0x1110", 4096);
        fake_function(root.path(), "0000:00:05.0", "0x1af4", "0x1110", 4096);
        fake_function(root.path(), "0000:00:03.0", "0x1af4", "0x1110", 4096);

        let locations: Vec<PciLocation> = list_devices(&config(root.path()))
            .unwrap()
            .into_iter()
            .map(|d| d.location)
            .collect();
        assert_eq!(
            locations,
            vec![
                PciLocation::new(0, 3, 0),
                PciLocation::new(0, 5, 0),
                PciLocation::new(0, 5, 1),
                PciLocation::new(1, 0, 0),
            ]
        );
    }

    #[test]
    fn test_domain_does_not_affect_order() {
        let root = tempfile::tempdir().unwrap();
        fake_function(root.path(), "0000:05:00.0", "0x1af4", "0x1110", 4096);
        fake_function(root.path(), "0001:00:01.0", "0x1af4", "0x1110", 4096);

        let locations: Vec<PciLocation> = list_devices(&config(root.path()))
            .unwrap()
            .into_iter()
            .map(|d| d.location)
            .collect();
        assert_eq!(
            locations,
            vec![PciLocation::new(0, 1, 0), PciLocation::new(5, 0, 0)]
        );
    }

    #[test]
    fn test_listing_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        fake_function(root.path(), "0000:00:06.0", "0x1af4", "0x1110", 4096);
        fake_function(root.path(), "0000:00:04.0", "0x1af4", "0x1110", 4096);

        let first = list_devices(&config(root.path())).unwrap();
        let second = list_devices(&config(root.path())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unreadable_device_skipped_by_default() {
        let root = tempfile::tempdir().unwrap();
        fake_function(root.path(), "0000:00:04.0", "0x1af4", "0x1110", 4096);
        fake_function(root.path(), "0000:00:05.0", "0x1af4", "0x1110", 4096);
        fs::remove_file(root.path().join("0000:00:05.0").join("device")).unwrap();

        let devices = list_devices(&config(root.path())).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].location, PciLocation::new(0, 4, 0));
    }

    #[test]
    fn test_unreadable_device_aborts_when_strict() {
        let root = tempfile::tempdir().unwrap();
        fake_function(root.path(), "0000:00:04.0", "0x1af4", "0x1110", 4096);
        fs::remove_file(root.path().join("0000:00:04.0").join("device")).unwrap();

        let config = GuestConfig::builder()
            .pci_root(root.path())
            .fault_policy(FaultPolicy::Abort)
            .build();
        let err = list_devices(&config).unwrap_err();
        assert!(matches!(
            err,
            IvshmemError::OsOperationFailed {
                operation: "read PCI device id",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_root_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = list_devices(&config(&root.path().join("missing"))).unwrap_err();
        assert!(matches!(err, IvshmemError::OsOperationFailed { .. }));
    }

    #[test]
    fn test_empty_root_lists_nothing() {
        let root = tempfile::tempdir().unwrap();
        assert!(list_devices(&config(root.path())).unwrap().is_empty());
    }
}
