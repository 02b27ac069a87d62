//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `dns_control` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing error output
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use dns_control::initialization::{init_crypto_provider, init_logger_with};
use dns_control::{run_control_plane, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments into Config
    let config = Config::parse();

    // Initialize logger based on config
    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    // Initialize crypto provider for TLS operations
    init_crypto_provider();

    match run_control_plane(config).await {
        Ok(()) => {
            println!("dns_control stopped");
            Ok(())
        }
        Err(e) => {
            eprintln!("dns_control error: {:#}", e);
            process::exit(1);
        }
    }
}
