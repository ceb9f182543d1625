//! Peer-synchronized HTTP/1.1 node.
//!
//! A hand-written HTTP/1.1 server (framing, decoding, keep-alive, lifecycle
//! gate) hosting a small set of endpoints, plus a peer mesh that keeps a
//! grow-only set of 64-bit request ids converging across nodes.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client / Peer                ┌──────────────────────────────────────────────┐
//!     ─────────────────────────────┼─▶ net::listener ─▶ net::handler              │
//!                                  │                      │ decode (http::request)  │
//!                                  │                      ▼                         │
//!                                  │              lifecycle gate ─▶ routing         │
//!                                  │                                  │             │
//!                                  │        ┌──────────────┬──────────┴───────┐     │
//!                                  │        ▼              ▼                  ▼     │
//!                                  │  sync::endpoint   admin (/peers,     /health   │
//!                                  │        │          /stats)                      │
//!                                  │        ▼              │                        │
//!                                  │  stats (id set) ◀─────┘   peers (registry)     │
//!                                  │        ▲                        ▲              │
//!                                  │        └──── sync::push task ───┘              │
//!     ◀────────────────────────────┼── http::response (Content-Length framed)       │
//!                                  │                                                │
//!                                  │  events ─▶ access log, id recorder, metrics    │
//!                                  └────────────────────────────────────────────────┘
//! ```

// Protocol and transport
pub mod http;
pub mod net;
pub mod routing;

// Mesh
pub mod peers;
pub mod stats;
pub mod sync;

// Endpoints and assembly
pub mod admin;
pub mod node;

// Cross-cutting concerns
pub mod config;
pub mod events;
pub mod lifecycle;
pub mod observability;
pub mod persistence;
pub mod resilience;

pub use config::NodeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use node::{NodeError, PeerNode};
