//! PCI function addresses and the platform encodings they arrive in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IvshmemError, Result};

/// Location of a PCI function on its bus.
///
/// Ordering is lexicographic over (bus, device, function), which is the order
/// devices are listed in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PciLocation {
    bus: u8,
    device: u8,
    function: u8,
}

/// Textual encodings a [`PciLocation`] can be decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationDialect {
    /// Linux sysfs directory name, e.g. `0000:08:01.0`.
    SysfsDirName,
    /// Windows `SPDRP_LOCATION_INFORMATION`, e.g. `PCI bus 4, device 1, function 0`.
    WindowsRegistryText,
}

impl PciLocation {
    /// Creates a location from its raw parts.
    #[must_use]
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device,
            function,
        }
    }

    /// Returns the bus number.
    #[must_use]
    pub const fn bus(&self) -> u8 {
        self.bus
    }

    /// Returns the device number.
    #[must_use]
    pub const fn device(&self) -> u8 {
        self.device
    }

    /// Returns the function number.
    #[must_use]
    pub const fn function(&self) -> u8 {
        self.function
    }

    /// Decodes a location in the given dialect.
    ///
    /// # Errors
    ///
    /// Returns [`IvshmemError::InvalidLocationFormat`] if `raw` does not
    /// follow the dialect's layout.
    pub fn parse(raw: &str, dialect: LocationDialect) -> Result<Self> {
        match dialect {
            LocationDialect::SysfsDirName => parse_sysfs(raw),
            LocationDialect::WindowsRegistryText => parse_windows(raw),
        }
    }

    /// Formats the sysfs directory name of this function in `domain`.
    #[must_use]
    pub fn sysfs_name(&self, domain: u16) -> String {
        format!(
            "{:04x}:{:02x}:{:02x}.{:x}",
            domain, self.bus, self.device, self.function
        )
    }
}

impl fmt::Display for PciLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PCI bus {}, device {}, function {}",
            self.bus, self.device, self.function
        )
    }
}

impl FromStr for PciLocation {
    type Err = IvshmemError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, LocationDialect::WindowsRegistryText)
    }
}

impl From<(u8, u8, u8)> for PciLocation {
    fn from((bus, device, function): (u8, u8, u8)) -> Self {
        Self::new(bus, device, function)
    }
}

/// Parses a hexadecimal sysfs field, keeping the low 8 bits.
///
/// Only hex digits are accepted; `from_str_radix` alone would take a sign.
fn hex_field(raw: &str, field: &str, reason: &'static str) -> Result<u8> {
    if field.starts_with(['+', '-']) {
        return Err(IvshmemError::invalid_location(raw, reason));
    }
    u32::from_str_radix(field, 16)
        .map(|value| value as u8)
        .map_err(|_| IvshmemError::invalid_location(raw, reason))
}

fn parse_sysfs(raw: &str) -> Result<PciLocation> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [_domain, bus, dev_func] = parts.as_slice() else {
        return Err(IvshmemError::invalid_location(
            raw,
            "expected 3 colon-separated parts",
        ));
    };

    let dev_func: Vec<&str> = dev_func.split('.').collect();
    let [device, function] = dev_func.as_slice() else {
        return Err(IvshmemError::invalid_location(
            raw,
            "expected device.function",
        ));
    };

    Ok(PciLocation {
        bus: hex_field(raw, bus, "bus is not hexadecimal")?,
        device: hex_field(raw, device, "device is not hexadecimal")?,
        function: hex_field(raw, function, "function is not hexadecimal")?,
    })
}

/// Decodes the first character of a token as a decimal digit.
///
/// The registry text has a trailing comma on these tokens; only single-digit
/// bus and device numbers are representable this way.
fn leading_digit(raw: &str, token: &str, reason: &'static str) -> Result<u8> {
    token
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
        .ok_or_else(|| IvshmemError::invalid_location(raw, reason))
}

fn parse_windows(raw: &str) -> Result<PciLocation> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() != 7 {
        return Err(IvshmemError::invalid_location(raw, "expected 7 tokens"));
    }

    let bus = leading_digit(raw, tokens[2], "bus is not a digit")?;
    let device = leading_digit(raw, tokens[4], "device is not a digit")?;
    let function = tokens[6]
        .parse::<u8>()
        .map_err(|_| IvshmemError::invalid_location(raw, "function is not a number"))?;

    Ok(PciLocation {
        bus,
        device,
        function,
    })
}
