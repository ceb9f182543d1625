//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, counts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NodeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::NodeConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if config.connection.keep_alive_timeout_ms == 0 {
        errors.push(ValidationError::new("connection.keep_alive_timeout_ms", "must be > 0"));
    }
    if config.connection.max_requests_per_connection == 0 {
        errors.push(ValidationError::new(
            "connection.max_requests_per_connection",
            "must be > 0",
        ));
    }

    if config.sync.interval_secs == 0 {
        errors.push(ValidationError::new("sync.interval_secs", "must be > 0"));
    }
    if config.sync.last_n == 0 {
        errors.push(ValidationError::new("sync.last_n", "must be > 0"));
    }
    if !config.sync.path.starts_with('/') {
        errors.push(ValidationError::new("sync.path", "must start with '/'"));
    }
    if config.sync.max_attempts == 0 {
        errors.push(ValidationError::new("sync.max_attempts", "must be > 0"));
    }
    if config.sync.request_timeout_ms == 0 {
        errors.push(ValidationError::new("sync.request_timeout_ms", "must be > 0"));
    }

    for peer in &config.node.seed_peers {
        if peer.trim().is_empty() {
            errors.push(ValidationError::new("node.seed_peers", "empty peer address"));
        }
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected \"pretty\" or \"json\", got {:?}", config.observability.log_format),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
