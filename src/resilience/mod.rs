//! Resilience helpers for outbound peer calls.
//!
//! # Data Flow
//! ```text
//! Sync push to a peer:
//!     → client timeout (connect + request deadline)
//!     → On failure: retries.rs sleeps a jittered exponential delay, tries again
//!     → Exhausted: caller marks the peer DOWN
//! ```

pub mod retries;

pub use retries::RetryPolicy;
