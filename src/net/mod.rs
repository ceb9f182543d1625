//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (tracking guard, drain flag)
//!     → handler.rs (request loop until close)
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod handler;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use handler::{keep_alive_decision, serve_connection, ConnectionContext};
pub use listener::{ConnectionPermit, Listener, ListenerError};
