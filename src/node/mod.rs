//! Node assembly.
//!
//! # Responsibilities
//! - Build every subsystem from one `NodeConfig` and a persistence store
//! - Start: bind, record the self address, load peers, spawn server and
//!   sync, open the lifecycle gate
//! - Stop: close the gate, cancel sync, drain the server
//!
//! # Data Flow
//! ```text
//! NodeConfig + Persistence
//!     → EventBus (+ access log, id recorder, metrics observers)
//!     → Statistics, PeerRegistry
//!     → Router: /sync/stats, /peers, /stats, /health
//!     → HttpServer (Listener + Lifecycle + Router)
//!     → PeerSync task
//! ```
//!
//! # Design Decisions
//! - Every dependency is constructed here and passed down explicitly; no
//!   subsystem reaches for a global
//! - The server accepts before the gate opens, so early requests get the
//!   "initializing" 503 instead of a refused connection

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::admin::{AdminAuth, HealthEndpoint, PeersEndpoint, StatsEndpoint};
use crate::config::NodeConfig;
use crate::events::{observers, EventBus};
use crate::http::dispatch::Dispatcher;
use crate::http::HttpServer;
use crate::lifecycle::{Lifecycle, LifecycleError, ServerState, Shutdown};
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::peers::record::format_address;
use crate::peers::PeerRegistry;
use crate::persistence::{JsonLinesStore, NoopStore, Persistence};
use crate::routing::Router;
use crate::stats::{IdGenerator, Statistics};
use crate::sync::{PeerSync, SyncEndpoint, SyncHandle};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("persistence: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,
}

struct Running {
    local_addr: SocketAddr,
    server: JoinHandle<Result<(), ListenerError>>,
    sync: Option<SyncHandle>,
    tracker: ConnectionTracker,
}

pub struct PeerNode {
    config: NodeConfig,
    events: Arc<EventBus>,
    stats: Arc<Statistics>,
    registry: Arc<PeerRegistry>,
    lifecycle: Arc<Lifecycle>,
    sync: Arc<PeerSync>,
    router: Arc<Router>,
    store: Arc<dyn Persistence>,
    shutdown: Shutdown,
    running: Mutex<Option<Running>>,
}

impl PeerNode {
    /// Assemble a node. Must be called inside a tokio runtime.
    pub fn new(config: NodeConfig, store: Arc<dyn Persistence>) -> Self {
        let events = EventBus::new();
        let stats = Arc::new(Statistics::new(IdGenerator::default(), Arc::clone(&store)));
        let registry = Arc::new(PeerRegistry::new(Arc::clone(&store)));
        let lifecycle = Arc::new(Lifecycle::new());
        let auth = AdminAuth::new(config.admin.api_key.clone());

        observers::access_log(&events);
        observers::id_recorder(&events, Arc::clone(&stats), config.sync.path.clone());
        observers::metrics_recorder(&events, Arc::clone(&stats));

        let router = Router::new()
            .exact(&config.sync.path, Arc::new(SyncEndpoint::new(Arc::clone(&stats))))
            .exact(
                "/peers",
                Arc::new(PeersEndpoint::new(Arc::clone(&registry), auth.clone())),
            )
            .exact("/stats", Arc::new(StatsEndpoint::new(Arc::clone(&stats), auth)))
            .exact(
                "/health",
                Arc::new(HealthEndpoint::new(
                    Arc::clone(&lifecycle),
                    Arc::clone(&registry),
                    Arc::clone(&stats),
                )),
            );

        let sync = Arc::new(PeerSync::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            config.sync.clone(),
        ));

        Self {
            config,
            events,
            stats,
            registry,
            lifecycle,
            sync,
            router: Arc::new(router),
            store,
            shutdown: Shutdown::new(),
            running: Mutex::new(None),
        }
    }

    /// Assemble a node with the store named by `persistence.path`.
    pub fn from_config(config: NodeConfig) -> Result<Self, NodeError> {
        let store: Arc<dyn Persistence> = match &config.persistence.path {
            Some(path) => Arc::new(JsonLinesStore::open(path)?),
            None => Arc::new(NoopStore),
        };
        Ok(Self::new(config, store))
    }

    /// Bind and begin serving. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, NodeError> {
        if self.bound_addr().is_some() {
            return Err(NodeError::AlreadyStarted);
        }
        if self.lifecycle.state() == ServerState::Closing {
            return Err(LifecycleError::Terminal.into());
        }

        let listener = Listener::bind(&self.config.listener).await?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        let advertised = self.advertised_address(local_addr);
        self.registry.set_self(&advertised).await;

        let restored = self.registry.load_persisted().await;
        for seed in &self.config.node.seed_peers {
            self.registry.add_peer(seed, false).await;
        }
        tracing::info!(
            restored,
            peers = self.registry.len(),
            ids = self.stats.total(),
            "Peer state loaded"
        );

        let dispatcher: Arc<dyn Dispatcher> = Arc::clone(&self.router) as Arc<dyn Dispatcher>;
        let server = HttpServer::new(
            &self.config,
            Arc::clone(&self.lifecycle),
            Some(dispatcher),
            Arc::clone(&self.events),
        );
        let tracker = server.tracker();
        let server = tokio::spawn(server.run(listener, self.shutdown.subscribe()));

        let sync = self
            .config
            .sync
            .enabled
            .then(|| Arc::clone(&self.sync).spawn(self.shutdown.subscribe()));

        self.lifecycle.start()?;
        *self.running.lock().unwrap_or_else(|e| e.into_inner()) = Some(Running {
            local_addr,
            server,
            sync,
            tracker,
        });

        tracing::info!(
            node = %self.config.node.name,
            address = %local_addr,
            advertised = %advertised,
            "Node started"
        );
        Ok(local_addr)
    }

    /// Close the gate, cancel sync without waiting, drain the server, and
    /// flush the persistence journal.
    pub async fn stop(&self) {
        self.lifecycle.stop();
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.shutdown.trigger();

        let Some(running) = running else {
            return;
        };
        if let Some(sync) = &running.sync {
            sync.stop();
        }
        match running.server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Server exited with error"),
            Err(e) => tracing::error!(error = %e, "Server task failed"),
        }
        self.store.flush().await;
        tracing::info!(
            remaining_connections = running.tracker.active_count(),
            "Node stopped"
        );
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound_addr()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub fn sync(&self) -> &Arc<PeerSync> {
        &self.sync
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn bound_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|r| r.local_addr)
    }

    fn advertised_address(&self, bound: SocketAddr) -> String {
        match &self.config.node.advertise_host {
            Some(host) if !host.trim().is_empty() => format_address(host.trim(), bound.port()),
            _ => {
                let ip = if bound.ip().is_unspecified() {
                    IpAddr::V4(Ipv4Addr::LOCALHOST)
                } else {
                    bound.ip()
                };
                format_address(&ip.to_string(), bound.port())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::PeerStatus;
    use crate::persistence::MemoryStore;

    fn local_config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.sync.enabled = false;
        config
    }

    #[tokio::test]
    async fn start_records_self_and_seeds() {
        let mut config = local_config();
        config.node.seed_peers = vec!["10.1.1.1:9000".into()];
        let store = Arc::new(MemoryStore::with_peers(["10.2.2.2:9000"]));
        let node = PeerNode::new(config, store);

        let addr = node.start().await.unwrap();
        let me = node.registry().get_self().unwrap();
        assert_eq!(me.status, PeerStatus::SelfNode);
        assert_eq!(me.port, addr.port());
        assert_eq!(node.registry().len(), 2);
        assert_eq!(node.lifecycle().state(), ServerState::Open);

        assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));

        node.stop().await;
        assert_eq!(node.lifecycle().state(), ServerState::Closing);
        assert!(node.local_addr().is_none());
        assert!(matches!(node.start().await, Err(NodeError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn journal_written_during_a_run_is_restored_on_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config();
        config.persistence.path = Some(dir.path().join("mesh.jsonl").to_string_lossy().into_owned());

        let first = PeerNode::from_config(config.clone()).unwrap();
        first.start().await.unwrap();
        assert!(first.registry().add_peer("10.4.4.4:9000", true).await);
        first.stats().merge([11, 12]);
        first.stop().await;

        let second = PeerNode::from_config(config).unwrap();
        second.start().await.unwrap();
        assert!(second.registry().get("10.4.4.4:9000").is_some());
        assert!(second.stats().contains(11) && second.stats().contains(12));
        second.stop().await;
    }

    #[tokio::test]
    async fn stop_before_start_is_harmless() {
        let node = PeerNode::new(local_config(), Arc::new(NoopStore));
        node.stop().await;
        assert_eq!(node.lifecycle().state(), ServerState::Initializing);
    }
}
