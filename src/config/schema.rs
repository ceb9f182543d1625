//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a mesh node.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a mesh node.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Node identity and seed peers.
    pub node: NodeSection,

    /// Listener configuration (bind address, backpressure).
    pub listener: ListenerConfig,

    /// Per-connection keep-alive settings.
    pub connection: ConnectionConfig,

    /// Peer synchronization settings.
    pub sync: SyncConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Admin endpoint credential.
    pub admin: AdminConfig,

    /// Where peers and ids are persisted.
    pub persistence: PersistenceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NodeSection {
    /// Name used in log fields.
    pub name: String,

    /// Host other peers should use to reach this node. Defaults to the
    /// bound IP (loopback when bound to the unspecified address).
    pub advertise_host: Option<String>,

    /// Peers registered at startup (`host:port`).
    pub seed_peers: Vec<String>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: "mesh-node".to_string(),
            advertise_host: None,
            seed_peers: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10,
        }
    }
}

/// Keep-alive settings applied to every accepted connection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Idle time allowed between requests on one connection.
    pub keep_alive_timeout_ms: u64,

    /// Requests served on one connection before it is closed.
    pub max_requests_per_connection: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            keep_alive_timeout_ms: 10_000,
            max_requests_per_connection: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Run the periodic push to peers.
    pub enabled: bool,

    /// Seconds between push rounds.
    pub interval_secs: u64,

    /// How many of the most recent ids each push carries.
    pub last_n: usize,

    /// Delay before the first round.
    pub initial_delay_secs: u64,

    /// Path of the sync endpoint on every peer.
    pub path: String,

    /// Pull each peer's full set after pushing.
    pub pull_enabled: bool,

    /// Attempts per peer per round (first try included).
    pub max_attempts: u32,

    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    /// Connect plus request deadline for one attempt.
    pub request_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600,
            last_n: 200,
            initial_delay_secs: 5,
            path: "/sync/stats".to_string(),
            pull_enabled: false,
            max_attempts: 2,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 2_000,
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long live connections may drain after stop.
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { drain_timeout_ms: 2_000 }
    }
}

/// Admin credential. An empty key disables every admin mutation.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// API key accepted as `Authorization: Bearer <key>` or `X-Admin-Key`.
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    /// JSON-lines journal file. Nothing is persisted when unset.
    pub path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
