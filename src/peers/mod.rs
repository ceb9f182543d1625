//! Peer mesh bookkeeping.
//!
//! # Data Flow
//! ```text
//! POST /peers, seed peers, persisted peers
//!     → registry.rs normalize (resolve host, default port)
//!     → dedupe against self + existing records
//!     → record.rs PeerRecord (UNKNOWN)
//! Sync scheduler → mark_up / mark_down
//! ```

pub mod record;
pub mod registry;

pub use record::{PeerRecord, PeerStatus, PeerView};
pub use registry::PeerRegistry;
