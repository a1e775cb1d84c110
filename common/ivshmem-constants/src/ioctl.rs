//! Control codes understood by the Windows IVSHMEM driver.

/// `FILE_DEVICE_UNKNOWN` device type.
pub const FILE_DEVICE_UNKNOWN: u32 = 0x22;

/// `METHOD_BUFFERED` transfer type.
pub const METHOD_BUFFERED: u32 = 0;

/// `FILE_ANY_ACCESS` required access.
pub const FILE_ANY_ACCESS: u32 = 0;

/// First function number used by the driver.
pub const FUNCTION_BASE: u32 = 0x800;

/// Equivalent of the `CTL_CODE` macro from `winioctl.h`.
#[must_use]
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

const fn driver_code(offset: u32) -> u32 {
    ctl_code(
        FILE_DEVICE_UNKNOWN,
        FUNCTION_BASE + offset,
        METHOD_BUFFERED,
        FILE_ANY_ACCESS,
    )
}

/// Driver requests used for mapping, in function-number order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IvshmemIoctl {
    RequestPeerId = driver_code(0),
    RequestSize = driver_code(1),
    RequestMmap = driver_code(2),
    ReleaseMmap = driver_code(3),
}

impl IvshmemIoctl {
    /// Returns the raw control code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::IvshmemIoctl;

    #[test]
    fn ioctl_codes_match_driver_header() {
        const CASES: &[(u32, IvshmemIoctl)] = &[
            (2_236_416, IvshmemIoctl::RequestPeerId),
            (2_236_420, IvshmemIoctl::RequestSize),
            (2_236_424, IvshmemIoctl::RequestMmap),
            (2_236_428, IvshmemIoctl::ReleaseMmap),
        ];

        for (raw, expected) in CASES {
            assert_eq!(expected.code(), *raw);
        }
    }

    #[test]
    fn ctl_code_layout() {
        assert_eq!(super::ctl_code(0x22, 0x800, 0, 0), 0x0022_2000);
        assert_eq!(super::ctl_code(0x22, 0x801, 3, 1), 0x0022_6007);
    }
}
