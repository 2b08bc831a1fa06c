//! ## faultline-cli
//! **Operator interface of the fault injection agent**
//!
//! Replays scenarios against the simulated cloud, lists the offered actions
//! and prints the effective configuration.

use anyhow::Result;
use clap::Parser;
use faultline_telemetry::EventLogger;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_ref())?;
    EventLogger::init(&config.telemetry.log_level);

    commands::run_command(&cli, config).await
}
