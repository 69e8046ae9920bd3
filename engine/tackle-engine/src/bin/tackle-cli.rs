//! # Tackle CLI Binary
//!
//! Command-line entry point for building tackle opportunity tables.

use anyhow::Result;
use clap::Parser;
use tackle_engine::cli::{Cli, CliHandler};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let handler = CliHandler::new(cli.config.as_ref())?;
    handler.handle_command(cli.command)?;

    Ok(())
}
