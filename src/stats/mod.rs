//! Distributed request log.
//!
//! # Data Flow
//! ```text
//! Request event → store.rs log_request → id.rs next_id → IdSet
//! POST /sync/stats → store.rs merge_payload → IdSet (union)
//! Sync scheduler → store.rs payload_last(n) → peers
//! ```

pub mod id;
pub mod store;

pub use id::IdGenerator;
pub use store::{parse_timestamps, IdSet, Statistics, TimestampsPayload};
