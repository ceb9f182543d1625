//! Peer record and status.
//!
//! # States
//! ```text
//! UNKNOWN ──push ok──▶ UP
//!    │                 │ ▲
//!    └──push failed──▶ DOWN
//! SELF: this node's own record, never synced
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeerStatus {
    Unknown,
    Up,
    Down,
    #[serde(rename = "SELF")]
    SelfNode,
}

impl PeerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerStatus::Unknown => "UNKNOWN",
            PeerStatus::Up => "UP",
            PeerStatus::Down => "DOWN",
            PeerStatus::SelfNode => "SELF",
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One known node, keyed by its canonical `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub host: String,
    pub port: u16,
    pub status: PeerStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

impl PeerRecord {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            status: PeerStatus::Unknown,
            last_seen: None,
        }
    }

    /// Canonical address; IPv6 hosts are bracketed.
    pub fn address(&self) -> String {
        format_address(&self.host, self.port)
    }
}

pub(crate) fn format_address(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// JSON view served by `GET /peers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerView {
    pub address: String,
    pub status: PeerStatus,
    #[serde(rename = "lastSeen")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(rename = "self")]
    pub is_self: bool,
}

impl From<&PeerRecord> for PeerView {
    fn from(record: &PeerRecord) -> Self {
        Self {
            address: record.address(),
            status: record.status,
            last_seen: record.last_seen,
            is_self: record.status == PeerStatus::SelfNode,
        }
    }
}
