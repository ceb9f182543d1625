//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::NodeConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_KEEP_ALIVE_TIMEOUT_MS: &str = "KEEP_ALIVE_TIMEOUT_MS";
pub const ENV_MAX_REQUESTS_PER_CONNECTION: &str = "MAX_REQUESTS_PER_CONNECTION";
pub const ENV_PEER_SYNC_INTERVAL_SECONDS: &str = "PEER_SYNC_INTERVAL_SECONDS";
pub const ENV_PEER_SYNC_LAST_N: &str = "PEER_SYNC_LAST_N";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load a TOML file, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<NodeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: NodeConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Defaults plus environment overrides, validated. Used when no file is given.
pub fn from_env() -> Result<NodeConfig, ConfigError> {
    let mut config = NodeConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the recognized environment overrides. Values that are not positive
/// integers are logged and ignored.
pub fn apply_env_overrides<F>(config: &mut NodeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = positive(&lookup, ENV_KEEP_ALIVE_TIMEOUT_MS) {
        config.connection.keep_alive_timeout_ms = v;
    }
    if let Some(v) = positive(&lookup, ENV_MAX_REQUESTS_PER_CONNECTION) {
        config.connection.max_requests_per_connection = v;
    }
    if let Some(v) = positive(&lookup, ENV_PEER_SYNC_INTERVAL_SECONDS) {
        config.sync.interval_secs = v;
    }
    if let Some(v) = positive(&lookup, ENV_PEER_SYNC_LAST_N) {
        config.sync.last_n = v;
    }
}

fn positive<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring invalid environment override");
            None
        }
    }
}
