//! Guest-side commands over an IVSHMEM PCI device.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ivshmem::{Guest, GuestConfig, PciLocation, SharedMemory};

use super::{OutputFormat, read_prefix, write_message};

/// Guest commands.
#[derive(Subcommand)]
pub enum GuestCommands {
    /// Print the start of the device's shared memory
    Read(ReadArgs),

    /// Write a message at the start of the device's shared memory
    Write(WriteArgs),
}

/// Device selection shared by guest commands.
#[derive(Args)]
pub struct DeviceArgs {
    /// Position of the device in `ivshmem list` (default: 0)
    #[arg(long, conflicts_with = "location")]
    pub index: Option<usize>,

    /// Device location, e.g. "PCI bus 0, device 4, function 0"
    #[arg(long)]
    pub location: Option<PciLocation>,
}

/// Arguments for guest read.
#[derive(Args)]
pub struct ReadArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Number of bytes to read
    #[arg(long, default_value_t = 64)]
    pub len: usize,
}

/// Arguments for guest write.
#[derive(Args)]
pub struct WriteArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Message to write
    pub message: String,
}

/// Execute guest commands.
pub fn execute(command: GuestCommands, config: &GuestConfig, format: OutputFormat) -> Result<()> {
    match command {
        GuestCommands::Read(args) => read(args, config, format),
        GuestCommands::Write(args) => write(args, config, format),
    }
}

fn open(args: &DeviceArgs, config: &GuestConfig) -> Result<Guest> {
    let mut guest = match args.location {
        Some(location) => Guest::with_config(location, config)
            .with_context(|| format!("Failed to open device at {}", location))?,
        None => {
            let index = args.index.unwrap_or(0);
            Guest::from_index_with(index, config)
                .with_context(|| format!("Failed to open device #{}", index))?
        }
    };
    guest.map().context("Failed to map shared memory")?;
    Ok(guest)
}

fn print_details(guest: &Guest) {
    println!("System:   {}", guest.system());
    println!("Location: {}", guest.location());
    println!("Device:   {}", guest.dev_path().display());
    println!("Size:     {} bytes", guest.size());
    #[cfg(windows)]
    {
        if let Some(peer_id) = guest.peer_id() {
            println!("Peer ID:  {}", peer_id);
        }
    }
}

fn read(args: ReadArgs, config: &GuestConfig, format: OutputFormat) -> Result<()> {
    let mut guest = open(&args.device, config)?;
    let data = read_prefix(&guest, args.len);

    match format {
        OutputFormat::Json => {
            let payload = serde_json::json!({
                "system": guest.system(),
                "location": guest.location(),
                "dev_path": guest.dev_path(),
                "size": guest.size(),
                "data": data,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("Failed to serialize output")?
            );
        }
        OutputFormat::Quiet => println!("{}", data),
        OutputFormat::Table => {
            print_details(&guest);
            println!("Data:     {}", data);
        }
    }

    guest.unmap()?;
    Ok(())
}

fn write(args: WriteArgs, config: &GuestConfig, format: OutputFormat) -> Result<()> {
    let mut guest = open(&args.device, config)?;
    write_message(&mut guest, &args.message)?;

    if format != OutputFormat::Quiet {
        print_details(&guest);
        println!("Wrote {} bytes", args.message.len());
    }

    guest.unmap()?;
    Ok(())
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    fn fake_device(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vendor"), "0x1af4\n").unwrap();
        fs::write(dir.join("device"), "0x1110\n").unwrap();
        fs::File::create(dir.join("resource2"))
            .unwrap()
            .set_len(4096)
            .unwrap();
    }

    #[test]
    fn test_write_then_read_by_location() {
        let root = tempfile::tempdir().unwrap();
        fake_device(root.path(), "0000:00:04.0");
        let config = GuestConfig::builder().pci_root(root.path()).build();

        let device = DeviceArgs {
            index: None,
            location: Some(PciLocation::new(0, 4, 0)),
        };
        write(
            WriteArgs {
                device,
                message: "from guest".to_string(),
            },
            &config,
            OutputFormat::Quiet,
        )
        .unwrap();

        let guest = open(
            &DeviceArgs {
                index: Some(0),
                location: None,
            },
            &config,
        )
        .unwrap();
        assert_eq!(read_prefix(&guest, 10), "from guest");
    }

    #[test]
    fn test_open_missing_device() {
        let root = tempfile::tempdir().unwrap();
        let config = GuestConfig::builder().pci_root(root.path()).build();

        let err = open(
            &DeviceArgs {
                index: None,
                location: None,
            },
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to open device #0"));
    }
}
