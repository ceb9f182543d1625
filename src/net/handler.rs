//! Per-connection request loop.
//!
//! # Responsibilities
//! - Decode requests one after another from a single buffered reader
//! - Gate each request through the lifecycle and dispatcher
//! - Negotiate keep-alive and stamp `Connection` / `Keep-Alive` headers
//! - Publish request and response events
//!
//! # Design Decisions
//! - Exactly one task owns a connection; the stream is shut down once, on
//!   every exit path
//! - Idle timeout, clean EOF, and server drain end the loop quietly;
//!   decode faults end it with a log line, never with a response
//! - Dispatcher errors and panics become a 500 and the connection lives on

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::events::{Event, EventBus, RequestEvent, ResponseEvent};
use crate::http::dispatch::Dispatcher;
use crate::http::framing::ByteReader;
use crate::http::request::decode_request;
use crate::http::{HttpError, Request, Response};
use crate::lifecycle::Lifecycle;
use crate::net::connection::ConnectionId;

/// Everything a connection task needs besides the stream.
#[derive(Clone)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub keep_alive_timeout: Duration,
    pub max_requests: u32,
    pub lifecycle: Arc<Lifecycle>,
    pub dispatcher: Option<Arc<dyn Dispatcher>>,
    pub events: Arc<EventBus>,
    pub drain: watch::Receiver<bool>,
}

/// Whether the connection should stay open after serving request number
/// `served` (1-based) of at most `max`.
///
/// `Connection: close` wins over `keep-alive`, which wins over the version
/// default (HTTP/1.1 persists, anything else closes). Reaching the cap
/// always closes.
pub fn keep_alive_decision(request: &Request, served: u32, max: u32) -> bool {
    if served >= max {
        return false;
    }

    let tokens: Vec<String> = request
        .header("Connection")
        .map(|v| v.split(',').map(|t| t.trim().to_ascii_lowercase()).collect())
        .unwrap_or_default();

    if tokens.iter().any(|t| t == "close") {
        return false;
    }
    if tokens.iter().any(|t| t == "keep-alive") {
        return true;
    }
    request.version.eq_ignore_ascii_case("HTTP/1.1")
}

/// Whole seconds advertised in `Keep-Alive: timeout=`, rounded up so a
/// sub-second idle deadline is never announced as zero.
pub fn advertised_timeout_secs(idle: Duration) -> u64 {
    let millis = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000).max(1)
}

fn internal_error() -> Response {
    Response::html(500, "<h1>Internal Server Error</h1>")
}

/// Serve requests on `stream` until it closes. Returns the number served.
pub async fn serve_connection<S>(stream: S, ctx: ConnectionContext) -> u32
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = ByteReader::new(read_half).with_idle_timeout(ctx.keep_alive_timeout);

    let served = request_loop(&mut reader, &mut write_half, ctx.clone()).await;

    if let Err(e) = write_half.shutdown().await {
        tracing::trace!(connection_id = %ctx.id, error = %e, "Shutdown after close failed");
    }
    tracing::debug!(connection_id = %ctx.id, served, "Connection finished");
    served
}

async fn request_loop<R, W>(reader: &mut ByteReader<R>, writer: &mut W, ctx: ConnectionContext) -> u32
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let ConnectionContext {
        id,
        keep_alive_timeout,
        max_requests,
        lifecycle,
        dispatcher,
        events,
        mut drain,
    } = ctx;
    let timeout_secs = advertised_timeout_secs(keep_alive_timeout);
    let mut served: u32 = 0;

    while served < max_requests {
        if *drain.borrow() {
            break;
        }

        let decoded = tokio::select! {
            decoded = decode_request(reader) => decoded,
            _ = drain.wait_for(|draining| *draining) => {
                tracing::debug!(connection_id = %id, "Closing idle connection for drain");
                break;
            }
        };

        let request = match decoded {
            Err(HttpError::IdleTimeout) => {
                tracing::debug!(connection_id = %id, "Keep-alive timeout");
                break;
            }
            Ok(None) => break,
            Err(HttpError::Io(e)) => {
                tracing::debug!(connection_id = %id, error = %e, "Read failed");
                break;
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, error = %e, "Dropping connection on bad request");
                break;
            }
            Ok(Some(request)) => Arc::new(request),
        };

        served += 1;
        let started = Instant::now();
        events.publish(Event::Request(RequestEvent {
            request: Arc::clone(&request),
            at: Utc::now(),
        }));

        let outcome = AssertUnwindSafe(lifecycle.handle(&request, dispatcher.as_deref()))
            .catch_unwind()
            .await;
        let mut response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(connection_id = %id, target = %request.target, error = %e, "Dispatch failed");
                internal_error()
            }
            Err(_) => {
                tracing::error!(connection_id = %id, target = %request.target, "Dispatcher panicked");
                internal_error()
            }
        };

        let draining = *drain.borrow();
        let keep_alive = !draining && keep_alive_decision(&request, served, max_requests);
        if keep_alive {
            response.headers.insert("Connection", "keep-alive");
            response.headers.insert(
                "Keep-Alive",
                format!("timeout={}, max={}", timeout_secs, max_requests - served),
            );
        } else {
            response.headers.insert("Connection", "close");
            response.headers.remove("Keep-Alive");
        }

        let wire = response.encode();
        if let Err(e) = write_all(writer, &wire).await {
            tracing::debug!(connection_id = %id, error = %e, "Write failed");
            break;
        }

        events.publish(Event::Response(ResponseEvent {
            request,
            status: response.status,
            duration: started.elapsed(),
            at: Utc::now(),
        }));

        if !keep_alive {
            break;
        }
    }

    served
}

async fn write_all<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
