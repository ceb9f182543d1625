//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! state.rs:
//!     Initializing → Open → Closing, gating every request dispatch
//!
//! Shutdown (shutdown.rs):
//!     stop() → trigger → listener stops accepting → drain connections
//!                      → sync scheduler abandons its round
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → node stop
//! ```
//!
//! # Design Decisions
//! - One lifecycle instance per server, owned by the node
//! - Shutdown has a deadline: stragglers are aborted after the drain window

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::{Lifecycle, LifecycleError, ServerState};
