//! Persistence notifier.
//!
//! # Responsibilities
//! - Receive fire-and-forget notifications for peer add/remove and new ids
//! - Provide the persisted peers and ids at startup
//!
//! # Design Decisions
//! - Notifications never return errors; stores log their own failures so a
//!   broken disk cannot fail a request or a sync merge
//! - Notifications never block on I/O; `flush` is the only wait
//! - The database-backed store of a full deployment lives outside this
//!   crate; `JsonLinesStore` is the local stand-in

pub mod journal;

use std::collections::BTreeSet;
use std::sync::Mutex;

use futures_util::future::BoxFuture;

pub use journal::JsonLinesStore;

/// Where a persisted id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdOrigin {
    /// Generated for a request served by this node.
    Local,
    /// Received from a peer during sync.
    Merged,
}

pub trait Persistence: Send + Sync {
    fn save_peer(&self, address: &str);
    fn delete_peer(&self, address: &str);
    fn load_peers(&self) -> Vec<String>;
    fn save_id(&self, id: u64, origin: IdOrigin);
    fn load_ids(&self) -> Vec<u64>;
    fn clear_ids(&self);

    /// Resolve once every notification sent so far has reached storage.
    fn flush(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

impl Persistence for NoopStore {
    fn save_peer(&self, _address: &str) {}
    fn delete_peer(&self, _address: &str) {}
    fn load_peers(&self) -> Vec<String> {
        Vec::new()
    }
    fn save_id(&self, _id: u64, _origin: IdOrigin) {}
    fn load_ids(&self) -> Vec<u64> {
        Vec::new()
    }
    fn clear_ids(&self) {}
}

/// In-process store; also records every notification it receives.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    peers: Vec<String>,
    ids: BTreeSet<u64>,
    notifications: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with peers as if they had been persisted by an earlier run.
    pub fn with_peers<I, S>(peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        store.lock().peers = peers.into_iter().map(Into::into).collect();
        store
    }

    /// Log of notifications, e.g. `"save_peer 10.0.0.1:80"`.
    pub fn notifications(&self) -> Vec<String> {
        self.lock().notifications.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Persistence for MemoryStore {
    fn save_peer(&self, address: &str) {
        let mut state = self.lock();
        if !state.peers.iter().any(|p| p == address) {
            state.peers.push(address.to_string());
        }
        state.notifications.push(format!("save_peer {}", address));
    }

    fn delete_peer(&self, address: &str) {
        let mut state = self.lock();
        state.peers.retain(|p| p != address);
        state.notifications.push(format!("delete_peer {}", address));
    }

    fn load_peers(&self) -> Vec<String> {
        self.lock().peers.clone()
    }

    fn save_id(&self, id: u64, _origin: IdOrigin) {
        self.lock().ids.insert(id);
    }

    fn load_ids(&self) -> Vec<u64> {
        self.lock().ids.iter().copied().collect()
    }

    fn clear_ids(&self) {
        let mut state = self.lock();
        state.ids.clear();
        state.notifications.push("clear_ids".to_string());
    }
}
