//! Host-side commands over the hypervisor's backing file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ivshmem::{Host, SharedMemory};
use ivshmem_constants::{devices, env};

use super::{OutputFormat, read_prefix, write_message};

/// Host commands.
#[derive(Subcommand)]
pub enum HostCommands {
    /// Write a message at the start of the shared memory
    Write(WriteArgs),

    /// Print the start of the shared memory
    Read(ReadArgs),
}

/// Arguments for host write.
#[derive(Args)]
pub struct WriteArgs {
    /// Backing file (default: $IVSHMEM_HOST_PATH or /dev/shm/ivshmem)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Message to write
    pub message: String,
}

/// Arguments for host read.
#[derive(Args)]
pub struct ReadArgs {
    /// Backing file (default: $IVSHMEM_HOST_PATH or /dev/shm/ivshmem)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Number of bytes to read
    #[arg(long, default_value_t = 64)]
    pub len: usize,
}

/// Execute host commands.
pub fn execute(command: HostCommands, format: OutputFormat) -> Result<()> {
    match command {
        HostCommands::Write(args) => write(args, format),
        HostCommands::Read(args) => read(args),
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    path.or_else(|| std::env::var_os(env::HOST_PATH).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(devices::DEFAULT_HOST_PATH))
}

fn open(path: Option<PathBuf>) -> Result<Host> {
    let path = resolve_path(path);
    let mut host =
        Host::new(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    host.map()
        .with_context(|| format!("Failed to map {}", path.display()))?;
    Ok(host)
}

fn write(args: WriteArgs, format: OutputFormat) -> Result<()> {
    let mut host = open(args.path)?;
    write_message(&mut host, &args.message)?;

    if format != OutputFormat::Quiet {
        println!(
            "Wrote {} bytes to {} ({} bytes)",
            args.message.len(),
            host.dev_path().display(),
            host.size()
        );
    }

    host.unmap()?;
    Ok(())
}

fn read(args: ReadArgs) -> Result<()> {
    let mut host = open(args.path)?;
    println!("{}", read_prefix(&host, args.len));
    host.unmap()?;
    Ok(())
}
