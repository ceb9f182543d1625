//! HTTP/1.1 protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::handler)
//!     → framing.rs (lines, exact reads, chunked bodies)
//!     → request.rs (request line, headers, body policy)
//!     → lifecycle gate → dispatch.rs (application dispatcher)
//!     → response.rs (serialize with Content-Length framing)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - No third-party HTTP stack; every byte on the wire is produced here
//! - Request bodies may be chunked; response bodies are always length-framed
//! - Decoding faults close the connection; dispatch faults become a 500

pub mod dispatch;
pub mod framing;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::{DispatchError, Dispatcher, FnDispatcher};
pub use framing::ByteReader;
pub use headers::HeaderMap;
pub use request::{decode_request, Request};
pub use response::{decode_response, Body, Response};
pub use server::HttpServer;

/// Errors raised while framing or decoding HTTP messages.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Malformed request line, headers, or framing fields.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer closed the stream in the middle of a message.
    #[error("stream ended mid-message")]
    TruncatedStream,

    /// No bytes arrived within the idle deadline.
    #[error("idle timeout while waiting for data")]
    IdleTimeout,

    /// A chunk-size token was not valid hexadecimal.
    #[error("malformed chunk size: {0}")]
    MalformedChunkSize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
