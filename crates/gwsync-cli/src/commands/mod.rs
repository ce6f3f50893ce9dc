//! Command implementations for the gwsync CLI

mod config;
mod run;

pub use config::execute as show_config;
pub use run::execute as run_pollers;

use anyhow::{Context, Result};
use gwsync_core::SyncConfig;
use std::path::Path;

/// Effective configuration: file (or defaults), then `GWSYNC_*` overrides.
fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let mut config = match path {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SyncConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
