//! Server lifecycle state machine.
//!
//! # States
//! ```text
//! Initializing ──start()──▶ Open ──stop()──▶ Closing
//! ```
//!
//! | State        | start()           | stop()        | handle()                         |
//! |--------------|-------------------|---------------|----------------------------------|
//! | Initializing | → Open            | no-op         | 503 initializing                 |
//! | Open         | no-op             | → Closing     | dispatcher, or 503 if none       |
//! | Closing      | rejected          | no-op         | 503 closing                      |
//!
//! # Design Decisions
//! - Transitions are monotonic; a closed server is never reopened
//! - The dispatcher is passed into `handle` by the caller instead of being
//!   stored behind a back-reference
//! - The state lock is never held across the dispatcher await

use std::fmt;
use std::sync::Mutex;

use crate::http::{DispatchError, Dispatcher, Request, Response};

/// Lifecycle phase of a server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Initializing,
    Open,
    Closing,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Initializing => "initializing",
            ServerState::Open => "open",
            ServerState::Closing => "closing",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("server is closing and cannot be started again")]
    Terminal,
}

/// Admission control for request dispatch.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<ServerState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::Initializing),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initializing → Open. Open stays Open; Closing is rejected.
    pub fn start(&self) -> Result<ServerState, LifecycleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            ServerState::Initializing => {
                *state = ServerState::Open;
                tracing::info!("Server is now open");
                Ok(ServerState::Open)
            }
            ServerState::Open => {
                tracing::info!("Start ignored: server already open");
                Ok(ServerState::Open)
            }
            ServerState::Closing => {
                tracing::warn!("Start rejected: server is closing");
                Err(LifecycleError::Terminal)
            }
        }
    }

    /// Open → Closing. Other states are unchanged.
    pub fn stop(&self) -> ServerState {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            ServerState::Initializing => {
                tracing::info!("Stop ignored: server still initializing");
            }
            ServerState::Open => {
                *state = ServerState::Closing;
                tracing::info!("Server is closing");
            }
            ServerState::Closing => {
                tracing::debug!("Stop ignored: server already closing");
            }
        }
        *state
    }

    /// Gate a request. Only the Open state reaches the dispatcher.
    pub async fn handle(
        &self,
        request: &Request,
        dispatcher: Option<&dyn Dispatcher>,
    ) -> Result<Response, DispatchError> {
        match self.state() {
            ServerState::Initializing => {
                tracing::debug!(target_path = %request.target, "Request rejected: initializing");
                Ok(Response::html(503, "<h1>Server is initializing, please wait.</h1>"))
            }
            ServerState::Closing => {
                tracing::debug!(target_path = %request.target, "Request rejected: closing");
                Ok(Response::html(
                    503,
                    "<h1>Server is currently closing, please try again later.</h1>",
                ))
            }
            ServerState::Open => match dispatcher {
                Some(dispatcher) => dispatcher.dispatch(request).await,
                None => Ok(Response::html(503, "<h1>Server not ready</h1>")),
            },
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FnDispatcher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn transitions_are_monotonic() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), ServerState::Initializing);

        assert_eq!(lc.stop(), ServerState::Initializing);
        assert_eq!(lc.start().unwrap(), ServerState::Open);
        assert_eq!(lc.start().unwrap(), ServerState::Open);
        assert_eq!(lc.stop(), ServerState::Closing);
        assert!(matches!(lc.start(), Err(LifecycleError::Terminal)));
        assert_eq!(lc.stop(), ServerState::Closing);
        assert_eq!(lc.state(), ServerState::Closing);
    }

    #[tokio::test]
    async fn gate_blocks_dispatch_outside_open() {
        let calls = AtomicUsize::new(0);
        let dispatcher = FnDispatcher(|_req: &Request| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, DispatchError>(Response::text(200, "app"))
        });
        let req = Request::new("GET", "/");
        let lc = Lifecycle::new();

        let resp = lc.handle(&req, Some(&dispatcher as &dyn Dispatcher)).await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(resp.body_text().contains("initializing"));

        lc.start().unwrap();
        let resp = lc.handle(&req, None).await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(resp.body_text().contains("not ready"));

        let resp = lc.handle(&req, Some(&dispatcher as &dyn Dispatcher)).await.unwrap();
        assert_eq!(resp.status, 200);

        lc.stop();
        let resp = lc.handle(&req, Some(&dispatcher as &dyn Dispatcher)).await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(resp.body_text().contains("closing"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
