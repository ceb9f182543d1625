//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → router.rs (scan routes, most specific first)
//!     → matcher.rs (exact or segment prefix)
//!     → endpoint Dispatcher, or 404
//! ```
//!
//! # Design Decisions
//! - Routes are fixed when the node is assembled
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use router::Router;
