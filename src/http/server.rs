//! HTTP server accept loop.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Spawn one connection task per accepted stream
//! - On shutdown: close the listening socket, drain live connections,
//!   then abort whatever is left
//!
//! # Design Decisions
//! - Connection tasks live in a `JoinSet` so shutdown can wait on or abort
//!   all of them
//! - The lifecycle gate, not the accept loop, decides what a request sees;
//!   the loop accepts in every state until shutdown fires

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::config::NodeConfig;
use crate::events::EventBus;
use crate::http::dispatch::Dispatcher;
use crate::lifecycle::{Lifecycle, ShutdownSignal};
use crate::net::{serve_connection, ConnectionContext, ConnectionTracker, Listener, ListenerError};

pub struct HttpServer {
    keep_alive_timeout: Duration,
    max_requests: u32,
    drain_timeout: Duration,
    lifecycle: Arc<Lifecycle>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    events: Arc<EventBus>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(
        config: &NodeConfig,
        lifecycle: Arc<Lifecycle>,
        dispatcher: Option<Arc<dyn Dispatcher>>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            keep_alive_timeout: Duration::from_millis(config.connection.keep_alive_timeout_ms),
            max_requests: config.connection.max_requests_per_connection.max(1),
            drain_timeout: Duration::from_millis(config.shutdown.drain_timeout_ms),
            lifecycle,
            dispatcher,
            events,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Serve until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) -> Result<(), ListenerError> {
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %local_addr, "HTTP server starting");

        let mut tasks = JoinSet::new();
        let mut outcome = Ok(());

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::trace!(error = %e, "Failed to set TCP_NODELAY");
                        }
                        let guard = self.tracker.track();
                        tracing::debug!(connection_id = %guard.id(), peer_addr = %peer_addr, "Serving connection");
                        let ctx = self.context(guard.id());
                        tasks.spawn(async move {
                            let _permit = permit;
                            let _guard = guard;
                            serve_connection(stream, ctx).await
                        });
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Listener failed");
                        outcome = Err(e);
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!("Connection task panicked");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("HTTP server received shutdown signal");
                    break;
                }
            }
        }

        drop(listener);
        self.drain(&mut tasks).await;
        tracing::info!("HTTP server stopped");
        outcome
    }

    fn context(&self, id: crate::net::ConnectionId) -> ConnectionContext {
        ConnectionContext {
            id,
            keep_alive_timeout: self.keep_alive_timeout,
            max_requests: self.max_requests,
            lifecycle: Arc::clone(&self.lifecycle),
            dispatcher: self.dispatcher.clone(),
            events: Arc::clone(&self.events),
            drain: self.tracker.drain_signal(),
        }
    }

    async fn drain(&self, tasks: &mut JoinSet<u32>) {
        self.tracker.start_draining();
        let live = tasks.len();
        if live == 0 {
            return;
        }

        tracing::info!(live, timeout_ms = self.drain_timeout.as_millis() as u64, "Draining connections");
        let drained = tokio::time::timeout(self.drain_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(remaining = tasks.len(), "Drain timed out, aborting connections");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}
