//! Waypost - session coordinator for the Waypost location beacon
//!
//! This is the binary entry point. All logic lives in the library crates;
//! this file parses arguments, loads settings, and dispatches.

mod report;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use waypost_app::{load_settings, load_settings_from};
use waypost_core::{logging, Result};

/// Waypost - delivers phone-side location fixes to the beacon Device
#[derive(Parser, Debug)]
#[command(name = "waypost")]
#[command(about = "Session coordinator for the Waypost location beacon", long_about = None)]
struct Args {
    /// Path to a config file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Device address override (bare host or host:port)
    #[arg(long, value_name = "ADDR")]
    address: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Supervise the event channel and react to Device triggers (default)
    Run,
    /// Check whether the Device answers on its status endpoint
    Probe,
    /// Acquire one fix and report it without delivering
    Locate,
    /// Acquire one fix and deliver it to the Device
    Send,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    if let Some(address) = args.address {
        settings.device.address = address;
    }

    let result = match args.command.unwrap_or(Command::Run) {
        Command::Run => runner::run(settings).await,
        Command::Probe => runner::probe_once(&settings).await,
        Command::Locate => runner::locate_once(&settings).await,
        Command::Send => runner::send_once(&settings).await,
    };

    if let Err(ref err) = result {
        report::ReportEvent::error(err.to_string(), true).emit();
    }
    result
}
