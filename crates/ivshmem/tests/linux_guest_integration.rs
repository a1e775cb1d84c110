//! Integration tests for the Linux guest backend.
//!
//! A temporary directory laid out like `/sys/bus/pci/devices` stands in for
//! sysfs; each BAR resource file is a plain file of the region's size.

#![cfg(target_os = "linux")]

use std::fs;
use std::path::Path;

use ivshmem::{
    FaultPolicy, Guest, GuestConfig, Host, IvshmemError, PciLocation, SharedMemory,
    list_devices_with,
};

const REGION_SIZE: u64 = 1024 * 1024;

fn pci_function(root: &Path, name: &str, vendor: &str, device: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("vendor"), format!("{vendor}\n")).unwrap();
    fs::write(dir.join("device"), format!("{device}\n")).unwrap();
    fs::write(dir.join("class"), "0x050000\n").unwrap();
    let bar = fs::File::create(dir.join("resource2")).unwrap();
    bar.set_len(REGION_SIZE).unwrap();
}

/// Two IVSHMEM devices, a virtio-net device and a host bridge.
fn fake_sysfs() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    pci_function(root.path(), "0000:00:05.0", "0x1af4", "0x1110");
    pci_function(root.path(), "0000:00:04.0", "0x1af4", "0x1110");
    pci_function(root.path(), "0000:00:03.0", "0x1af4", "0x1000");
    pci_function(root.path(), "0000:00:00.0", "0x8086", "0x1237");
    root
}

fn config(root: &Path) -> GuestConfig {
    GuestConfig::builder().pci_root(root).build()
}

// ============================================================================
// Enumeration
// ============================================================================

#[test]
fn test_lists_only_ivshmem_devices_in_order() {
    let root = fake_sysfs();

    let devices = list_devices_with(&config(root.path())).unwrap();
    let locations: Vec<_> = devices.iter().map(|d| d.location).collect();
    assert_eq!(
        locations,
        vec![PciLocation::new(0, 4, 0), PciLocation::new(0, 5, 0)]
    );
    assert_eq!(devices[0].description, "0000:00:04.0");
    assert!(devices[0].sort_key < devices[1].sort_key);
}

#[test]
fn test_listing_is_idempotent() {
    let root = fake_sysfs();
    let config = config(root.path());

    assert_eq!(
        list_devices_with(&config).unwrap(),
        list_devices_with(&config).unwrap()
    );
}

#[test]
fn test_broken_device_skipped_or_fatal() {
    let root = fake_sysfs();
    fs::remove_file(root.path().join("0000:00:05.0").join("device")).unwrap();

    let devices = list_devices_with(&config(root.path())).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].location, PciLocation::new(0, 4, 0));

    let strict = GuestConfig::builder()
        .pci_root(root.path())
        .fault_policy(FaultPolicy::Abort)
        .build();
    assert!(matches!(
        list_devices_with(&strict),
        Err(IvshmemError::OsOperationFailed { .. })
    ));
}

#[test]
fn test_listing_serializes_to_json() {
    let root = fake_sysfs();
    let devices = list_devices_with(&config(root.path())).unwrap();

    let json = serde_json::to_value(&devices).unwrap();
    assert_eq!(json[0]["location"]["bus"], 0);
    assert_eq!(json[0]["location"]["device"], 4);
    assert_eq!(json[1]["description"], "0000:00:05.0");
}

// ============================================================================
// Guest endpoint
// ============================================================================

#[test]
fn test_guest_not_found() {
    let root = fake_sysfs();

    let err = Guest::with_config(PciLocation::new(0, 3, 0), &config(root.path())).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        "device not found: PCI bus 0, device 3, function 0"
    );
}

#[test]
fn test_guest_maps_resource() {
    let root = fake_sysfs();
    let mut guest = Guest::with_config(PciLocation::new(0, 5, 0), &config(root.path())).unwrap();

    assert_eq!(guest.system(), "Linux");
    assert_eq!(guest.size(), 0);

    guest.map().unwrap();
    assert_eq!(guest.size(), REGION_SIZE);
    assert_eq!(guest.shared_mem().len() as u64, REGION_SIZE);
    assert!(matches!(guest.map(), Err(IvshmemError::AlreadyMapped)));

    guest.unmap().unwrap();
    assert!(matches!(guest.unmap(), Err(IvshmemError::AlreadyUnmapped)));
    assert!(matches!(guest.sync(), Err(IvshmemError::NotMapped)));
}

#[test]
fn test_guest_and_host_share_bytes() {
    let root = fake_sysfs();
    let mut guest = Guest::from_index_with(0, &config(root.path())).unwrap();
    let mut host = Host::new(guest.dev_path()).unwrap();
    guest.map().unwrap();
    host.map().unwrap();

    guest.shared_mem_mut()[..6].copy_from_slice(b"guest!");
    guest.sync().unwrap();
    assert_eq!(&host.shared_mem()[..6], b"guest!");

    host.shared_mem_mut()[6..11].copy_from_slice(b"host!");
    host.sync().unwrap();
    assert_eq!(&guest.shared_mem()[..11], b"guest!host!");
}

#[test]
fn test_guest_map_fails_without_resource() {
    let root = fake_sysfs();
    fs::remove_file(root.path().join("0000:00:04.0").join("resource2")).unwrap();

    let mut guest = Guest::with_config(PciLocation::new(0, 4, 0), &config(root.path())).unwrap();
    assert!(matches!(
        guest.map(),
        Err(IvshmemError::OsOperationFailed {
            operation: "open shared memory file",
            ..
        })
    ));
    assert!(!guest.is_mapped());
}
