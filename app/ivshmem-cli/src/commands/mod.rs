//! CLI command implementations.
//!
//! - Device listing
//! - Host-side read/write over the backing file
//! - Guest-side read/write over the PCI device

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use ivshmem::{GuestConfig, SharedMemory};

#[cfg(any(target_os = "linux", windows))]
pub mod guest;
#[cfg(unix)]
pub mod host;
pub mod list;

/// ivshmem - inspect IVSHMEM devices and exchange bytes through them
#[derive(Parser)]
#[command(name = "ivshmem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// PCI devices directory to enumerate (Linux)
    ///
    /// Can also be set via the IVSHMEM_PCI_ROOT environment variable.
    #[arg(long, global = true)]
    pub pci_root: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

impl Cli {
    /// Guest configuration from the environment and command-line overrides.
    pub fn guest_config(&self) -> GuestConfig {
        let mut config = GuestConfig::from_env();
        if let Some(root) = &self.pci_root {
            config.pci_root.clone_from(root);
        }
        config
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// Quiet mode (data only)
    Quiet,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// List IVSHMEM devices visible to this guest
    List,

    /// Access the host-side backing file
    #[cfg(unix)]
    #[command(subcommand)]
    Host(host::HostCommands),

    /// Access an IVSHMEM device from inside a guest
    #[cfg(any(target_os = "linux", windows))]
    #[command(subcommand)]
    Guest(guest::GuestCommands),

    /// Display platform information
    Info,
}

/// Copies `message` to the start of the region and syncs it.
pub(crate) fn write_message(mem: &mut impl SharedMemory, message: &str) -> Result<()> {
    let bytes = message.as_bytes();
    let size = mem.shared_mem().len();
    if bytes.len() > size {
        bail!(
            "message of {} bytes does not fit in {} bytes of shared memory",
            bytes.len(),
            size
        );
    }

    mem.shared_mem_mut()[..bytes.len()].copy_from_slice(bytes);
    mem.sync()?;
    Ok(())
}

/// Returns up to `len` leading bytes of the region as text, without trailing
/// NULs.
pub(crate) fn read_prefix(mem: &impl SharedMemory, len: usize) -> String {
    let region = mem.shared_mem();
    let bytes = &region[..len.min(region.len())];
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use ivshmem::Host;

    use super::*;

    fn mapped_host(len: u64) -> (tempfile::NamedTempFile, Host) {
        let file = tempfile::NamedTempFile::new().unwrap();
        file.as_file().set_len(len).unwrap();
        let mut host = Host::new(file.path()).unwrap();
        host.map().unwrap();
        (file, host)
    }

    #[test]
    fn test_write_then_read_prefix() {
        let (_file, mut host) = mapped_host(4096);
        write_message(&mut host, "hello").unwrap();
        assert_eq!(read_prefix(&host, 64), "hello");
        assert_eq!(read_prefix(&host, 3), "hel");
    }

    #[test]
    fn test_message_too_large() {
        let (_file, mut host) = mapped_host(4);
        let err = write_message(&mut host, "hello").unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }

    #[test]
    fn test_read_prefix_of_zeroed_region() {
        let (_file, host) = mapped_host(4096);
        assert_eq!(read_prefix(&host, 4096), "");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_cli_parses_guest_location() {
        let cli = Cli::try_parse_from([
            "ivshmem",
            "--pci-root",
            "/tmp/pci",
            "guest",
            "read",
            "--location",
            "PCI bus 0, device 4, function 0",
        ])
        .unwrap();
        assert_eq!(cli.guest_config().pci_root, PathBuf::from("/tmp/pci"));
        assert!(matches!(cli.command, Commands::Guest(_)));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_cli_rejects_index_and_location() {
        let result = Cli::try_parse_from([
            "ivshmem",
            "guest",
            "read",
            "--index",
            "0",
            "--location",
            "PCI bus 0, device 4, function 0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_host_read() {
        let cli =
            Cli::try_parse_from(["ivshmem", "host", "read", "--path", "/tmp/region"]).unwrap();
        assert!(matches!(cli.command, Commands::Host(_)));
    }
}
