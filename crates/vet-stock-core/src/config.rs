//! Engine configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::db::DEFAULT_BUSY_TIMEOUT;

/// Database file; in-memory when unset.
pub const ENV_DB_PATH: &str = "VET_STOCK_DB_PATH";
/// Milliseconds a writer waits on a locked database.
pub const ENV_BUSY_TIMEOUT_MS: &str = "VET_STOCK_BUSY_TIMEOUT_MS";
/// Log filter used when `RUST_LOG` is not set.
pub const ENV_LOG: &str = "VET_STOCK_LOG";
/// `1`/`true` switches log output to JSON lines.
pub const ENV_LOG_JSON: &str = "VET_STOCK_LOG_JSON";

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub database_path: Option<PathBuf>,
    pub busy_timeout: Duration,
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_path = lookup(ENV_DB_PATH)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let busy_timeout = match lookup(ENV_BUSY_TIMEOUT_MS) {
            Some(raw) => {
                let millis: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a whole number of milliseconds, got '{}'", ENV_BUSY_TIMEOUT_MS, raw))?;
                Duration::from_millis(millis)
            }
            None => defaults.busy_timeout,
        };

        let log_filter = lookup(ENV_LOG).unwrap_or(defaults.log_filter);

        let log_json = match lookup(ENV_LOG_JSON) {
            Some(raw) => parse_flag(&raw).with_context(|| format!("{} must be a boolean, got '{}'", ENV_LOG_JSON, raw))?,
            None => defaults.log_json,
        };

        Ok(Self {
            database_path,
            busy_timeout,
            log_filter,
            log_json,
        })
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("unrecognised flag value '{}'", other),
    }
}
