//! # CLI Structure and Argument Parsing
//!
//! ```bash
//! # One cycle of every poller against a captured catalog
//! gwsync run --snapshot catalog.json --once --journal published.jsonl
//!
//! # Poll forever on the configured interval until Ctrl-C
//! gwsync --log-format json run --config gwsync.toml --snapshot catalog.json
//!
//! # Show the effective configuration
//! gwsync config --config gwsync.toml
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Main CLI structure for the `gwsync` command.
#[derive(Parser, Clone, Debug)]
#[command(name = "gwsync")]
#[command(version)]
#[command(about = "gwsync - Sync gateway catalogs into a service registry", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Log line format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run the spec, product and proxy pollers
    Run(RunArgs),

    /// Print the effective configuration
    Config {
        /// Configuration file (TOML)
        #[arg(long, value_name = "FILE", env = "GWSYNC_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", env = "GWSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog snapshot to serve (JSON); re-read every interval
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Run one cycle of each poller and exit
    #[arg(long)]
    pub once: bool,

    /// Append published descriptions to this JSON lines file
    #[arg(long, value_name = "FILE")]
    pub journal: Option<PathBuf>,
}
