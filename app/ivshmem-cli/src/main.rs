//! ivshmem CLI - inspect IVSHMEM devices and exchange bytes through them.

use anyhow::Result;
use clap::Parser;
use ivshmem::GuestConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "ivshmem=debug,ivshmem_cli=debug"
    } else {
        "ivshmem=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = cli.guest_config();

    match cli.command {
        Commands::List => commands::list::execute(&config, cli.format),
        #[cfg(unix)]
        Commands::Host(cmd) => commands::host::execute(cmd, cli.format),
        #[cfg(any(target_os = "linux", windows))]
        Commands::Guest(cmd) => commands::guest::execute(cmd, &config, cli.format),
        Commands::Info => execute_info(&config),
    }
}

/// Display platform and enumeration information.
fn execute_info(config: &GuestConfig) -> Result<()> {
    println!("ivshmem Version: {}", env!("CARGO_PKG_VERSION"));
    println!("OS: {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!("Guest backend: {}", ivshmem::SYSTEM);
    if cfg!(target_os = "linux") {
        println!("PCI root: {}", config.pci_root.display());
    }

    match ivshmem::list_devices_with(config) {
        Ok(devices) => println!("Devices: {}", devices.len()),
        Err(e) => println!("Devices: (unavailable: {})", e),
    }

    Ok(())
}
