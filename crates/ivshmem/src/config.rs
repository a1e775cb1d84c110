//! Guest-side configuration.

use std::path::PathBuf;
use std::time::Duration;

use ivshmem_constants::{devices, env};

/// What to do when a single candidate device cannot be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Drop the device from the listing and log a warning.
    #[default]
    SkipDevice,
    /// Fail the whole listing with the device's error.
    Abort,
}

/// Caching attribute requested for the Windows driver mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CacheMode {
    /// Uncached access.
    NonCached = 0,
    /// Normal cached access.
    Cached = 1,
    /// Write-combined access.
    #[default]
    WriteCombined = 2,
}

/// Retry policy for the second device-interface detail query on Windows.
///
/// Only `ERROR_INVALID_PARAMETER` is retried, which setupapi is known to
/// report spuriously when the two detail queries follow each other closely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailRetry {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl Default for DetailRetry {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(5),
        }
    }
}

/// Configuration used to enumerate and open guest devices.
#[derive(Debug, Clone)]
pub struct GuestConfig {
    /// Directory listing PCI functions (Linux).
    pub pci_root: PathBuf,
    /// Vendor id to match, as printed by sysfs (Linux).
    pub vendor_id: String,
    /// Device id to match, as printed by sysfs (Linux).
    pub device_id: String,
    /// BAR whose resource file holds the shared memory (Linux).
    pub resource_bar: u8,
    /// Per-device failure handling during enumeration.
    pub fault_policy: FaultPolicy,
    /// Cache mode requested from the driver (Windows).
    pub cache_mode: CacheMode,
    /// Retry policy for the interface detail query (Windows).
    pub detail_retry: DetailRetry,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            pci_root: PathBuf::from(devices::PCI_DEVICES_DIR),
            vendor_id: devices::IVSHMEM_VENDOR_ID.to_string(),
            device_id: devices::IVSHMEM_DEVICE_ID.to_string(),
            resource_bar: devices::IVSHMEM_SHARED_MEMORY_BAR,
            fault_policy: FaultPolicy::default(),
            cache_mode: CacheMode::default(),
            detail_retry: DetailRetry::default(),
        }
    }
}

impl GuestConfig {
    /// Creates a new builder for guest configuration.
    #[must_use]
    pub fn builder() -> GuestConfigBuilder {
        GuestConfigBuilder::default()
    }

    /// Returns the default configuration with environment overrides applied.
    ///
    /// `IVSHMEM_PCI_ROOT` replaces the PCI devices directory.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(root) = std::env::var_os(env::PCI_ROOT) {
            config.pci_root = PathBuf::from(root);
        }
        config
    }

    /// Name of the resource file exposing the configured BAR.
    #[must_use]
    pub fn resource_file(&self) -> String {
        format!("resource{}", self.resource_bar)
    }
}

/// Builder for [`GuestConfig`].
#[derive(Debug, Default)]
pub struct GuestConfigBuilder {
    config: GuestConfig,
}

impl GuestConfigBuilder {
    /// Sets the PCI devices directory.
    #[must_use]
    pub fn pci_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.pci_root = root.into();
        self
    }

    /// Sets the vendor and device ids to match.
    #[must_use]
    pub fn ids(mut self, vendor_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        self.config.vendor_id = vendor_id.into();
        self.config.device_id = device_id.into();
        self
    }

    /// Sets the BAR to map.
    #[must_use]
    pub fn resource_bar(mut self, bar: u8) -> Self {
        self.config.resource_bar = bar;
        self
    }

    /// Sets the per-device failure policy.
    #[must_use]
    pub fn fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.config.fault_policy = policy;
        self
    }

    /// Sets the driver cache mode.
    #[must_use]
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.config.cache_mode = mode;
        self
    }

    /// Sets the detail query retry policy.
    #[must_use]
    pub fn detail_retry(mut self, retry: DetailRetry) -> Self {
        self.config.detail_retry = retry;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> GuestConfig {
        self.config
    }
}
