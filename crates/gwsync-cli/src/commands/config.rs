//! Config command implementation

use anyhow::Result;
use std::path::Path;

/// Print the effective configuration as TOML.
pub fn execute(path: Option<&Path>) -> Result<()> {
    let config = super::load_config(path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
