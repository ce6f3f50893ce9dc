//! Configuration for the sync engine.
//!
//! Settings are stored in TOML and may be overridden by `GWSYNC_*`
//! environment variables. Every section is optional; missing values fall back
//! to defaults.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [poll]
//! interval_secs = 30
//! workers = 10
//!
//! [specs]
//! parse_endpoints = true
//! match_on_url = true
//!
//! [filter.require]
//! team = "payments"
//!
//! [publish]
//! gateway_type = "Apigee"
//! ```
//!
//! ## Loading
//!
//! ```rust
//! use gwsync_core::SyncConfig;
//! use std::str::FromStr;
//!
//! let config = SyncConfig::from_str("[poll]\nworkers = 4\n")?;
//! assert_eq!(config.poll.workers, 4);
//! assert_eq!(config.poll.interval_secs, 30);
//! config.validate()?;
//! # Ok::<(), gwsync_core::Error>(())
//! ```

use crate::pool::WorkerPool;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding [`PollConfig::interval_secs`].
pub const ENV_POLL_INTERVAL_SECS: &str = "GWSYNC_POLL_INTERVAL_SECS";
/// Environment variable overriding [`PollConfig::workers`].
pub const ENV_WORKERS: &str = "GWSYNC_WORKERS";
/// Environment variable overriding [`SpecsConfig::match_on_url`].
pub const ENV_MATCH_ON_URL: &str = "GWSYNC_MATCH_ON_URL";
/// Environment variable overriding [`SpecsConfig::parse_endpoints`].
pub const ENV_PARSE_ENDPOINTS: &str = "GWSYNC_PARSE_ENDPOINTS";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Poll cadence and fan-out.
    pub poll: PollConfig,
    /// Spec handling.
    pub specs: SpecsConfig,
    /// Product filtering.
    pub filter: FilterConfig,
    /// Publishing.
    pub publish: PublishConfig,
}

/// Poll cadence and fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between poll cycles. A cycle still running when the next one
    /// is due makes that next one a no-op, so this is a floor.
    pub interval_secs: u64,

    /// Per-poller worker count, clamped to `1..=256` when the pool is built.
    pub workers: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            workers: 10,
        }
    }
}

impl PollConfig {
    /// Interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Worker pool sized from this configuration.
    pub const fn pool(&self) -> WorkerPool {
        WorkerPool::new(self.workers)
    }
}

/// Spec handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecsConfig {
    /// Download changed specs and extract the endpoints they serve.
    pub parse_endpoints: bool,

    /// Allow proxies to be matched to specs through virtual host URLs.
    pub match_on_url: bool,
}

impl Default for SpecsConfig {
    fn default() -> Self {
        Self {
            parse_endpoints: true,
            match_on_url: true,
        }
    }
}

/// Product filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Attributes a product must carry, by name, with the required value.
    /// Empty publishes every product.
    pub require: BTreeMap<String, String>,
}

/// Publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Value of the `GatewayType` attribute on every description.
    pub gateway_type: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            gateway_type: "Apigee".to_string(),
        }
    }
}

impl FromStr for SyncConfig {
    type Err = Error;

    fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        Self::from_str(&content)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))
    }

    /// Apply `GWSYNC_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `GWSYNC_*` overrides read through `lookup`.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_POLL_INTERVAL_SECS) {
            self.poll.interval_secs = parse_env(ENV_POLL_INTERVAL_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_WORKERS) {
            self.poll.workers = parse_env(ENV_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_MATCH_ON_URL) {
            self.specs.match_on_url = parse_flag(ENV_MATCH_ON_URL, &value)?;
        }
        if let Some(value) = lookup(ENV_PARSE_ENDPOINTS) {
            self.specs.parse_endpoints = parse_flag(ENV_PARSE_ENDPOINTS, &value)?;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(Error::Config("poll.interval_secs must be at least 1".into()));
        }
        if self.poll.workers == 0 {
            return Err(Error::Config("poll.workers must be at least 1".into()));
        }
        if self.publish.gateway_type.trim().is_empty() {
            return Err(Error::Config("publish.gateway_type must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {key}: '{value}'")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("Invalid value for {key}: '{value}'"))),
    }
}
