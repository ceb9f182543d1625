//! Admin subsystem.
//!
//! # Data Flow
//! ```text
//! Router
//!     → handlers.rs endpoint (PeersEndpoint, StatsEndpoint, HealthEndpoint)
//!     → auth.rs check on mutating methods (403 on failure)
//!     → registry / statistics
//! ```

pub mod auth;
pub mod handlers;

pub use auth::AdminAuth;
pub use handlers::{HealthEndpoint, PeersEndpoint, StatsEndpoint};
