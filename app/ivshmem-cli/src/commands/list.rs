//! Device listing.

use anyhow::{Context, Result};
use ivshmem::GuestConfig;

use super::OutputFormat;

/// Execute the list command.
pub fn execute(config: &GuestConfig, format: OutputFormat) -> Result<()> {
    let devices = ivshmem::list_devices_with(config).context("Failed to list IVSHMEM devices")?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&devices).context("Failed to serialize devices")?
            );
        }
        OutputFormat::Quiet => {
            for device in &devices {
                println!("{}", device.location);
            }
        }
        OutputFormat::Table => {
            if devices.is_empty() {
                println!("No IVSHMEM devices found.");
                return Ok(());
            }

            println!("{:<6} {:<36} {}", "INDEX", "LOCATION", "DESCRIPTION");
            for (index, device) in devices.iter().enumerate() {
                println!(
                    "{:<6} {:<36} {}",
                    index,
                    device.location.to_string(),
                    device.description
                );
            }
        }
    }

    Ok(())
}
