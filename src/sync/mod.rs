//! Peer synchronization protocol.
//!
//! # Data Flow
//! ```text
//! Outbound (push.rs, one task):
//!     interval tick
//!     → snapshot peers
//!     → POST {"timestamps":[last N]} via client.rs, retried per RetryPolicy
//!     → registry mark_up / mark_down
//!
//! Inbound (endpoint.rs):
//!     POST body → Statistics::merge_payload → 200 {"merged":k}
//!     GET       → full set
//! ```

pub mod client;
pub mod endpoint;
pub mod push;

use thiserror::Error;

use crate::http::HttpError;

pub use client::PeerClient;
pub use endpoint::SyncEndpoint;
pub use push::{PeerSync, RoundReport, SyncHandle};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("peer {address} timed out")]
    Timeout { address: String },

    #[error("peer {address} answered {status}")]
    Status { address: String, status: u16 },

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad reply: {0}")]
    Http(#[from] HttpError),
}
