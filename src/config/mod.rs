//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize)
//!     → loader.rs environment overrides (four recognized keys)
//!     → validation.rs (semantic checks)
//!     → NodeConfig (validated, immutable)
//!     → cloned into each subsystem at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::{
    AdminConfig, ConnectionConfig, ListenerConfig, NodeConfig, ObservabilityConfig,
    PersistenceConfig, ShutdownConfig, SyncConfig,
};
pub use validation::{validate_config, ValidationError};
