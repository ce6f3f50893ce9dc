//! gwsync CLI - gateway catalog discovery sync
//!
//! Serves a captured management-plane catalog to the sync engine, runs the
//! spec, product and proxy pollers against it and records every published
//! service description in a JSON lines journal.
use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
pub mod journal;
pub mod parser;
mod utils;

use crate::utils::initialize_logging;
use cli::{Cli, Commands};

/// Execute the gwsync CLI with the current process arguments.
///
/// # Errors
///
/// Returns an error if logging setup, configuration or command execution fails.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;

    match cli.command {
        Commands::Run(args) => commands::run_pollers(&args).await,
        Commands::Config { config } => commands::show_config(config.as_deref()),
    }
}
