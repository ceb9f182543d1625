//! Peer registry.
//!
//! # Responsibilities
//! - Normalize `host:port` strings to one canonical, resolved form
//! - Keep at most one record per canonical address
//! - Filter out this node's own address
//! - Notify persistence on add/remove
//!
//! # Design Decisions
//! - DNS names resolve to a numeric address (IPv4 preferred); on resolution
//!   failure the literal host is kept so offline peers can still be listed
//! - Removal falls back to a literal key lookup for entries persisted before
//!   normalization existed (see DESIGN.md)
//! - Readers always get snapshots, never a live view

use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::peers::record::{format_address, PeerRecord, PeerStatus, PeerView};
use crate::persistence::Persistence;

pub const DEFAULT_PEER_PORT: u16 = 80;

pub struct PeerRegistry {
    peers: DashMap<String, PeerRecord>,
    self_record: RwLock<Option<PeerRecord>>,
    store: Arc<dyn Persistence>,
}

impl PeerRegistry {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self {
            peers: DashMap::new(),
            self_record: RwLock::new(None),
            store,
        }
    }

    /// Canonical `host:port` for an address, or `None` if it cannot be parsed.
    pub async fn normalize(&self, host_port: &str) -> Option<String> {
        let (host, port) = resolve(host_port).await?;
        Some(format_address(&host, port))
    }

    /// Add a peer. Returns true if a new record was created.
    pub async fn add_peer(&self, address: &str, persist: bool) -> bool {
        let Some((host, port)) = resolve(address).await else {
            tracing::warn!(address, "Ignoring unparseable peer address");
            return false;
        };
        let key = format_address(&host, port);

        if self.is_self(&key) {
            tracing::debug!(address = %key, "Ignoring self registration");
            return false;
        }

        match self.peers.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(PeerRecord::new(host, port));
                if persist {
                    self.store.save_peer(&key);
                }
                tracing::info!(address = %key, "Peer added");
                true
            }
        }
    }

    /// Remove a peer. Returns false when no matching record exists.
    pub async fn remove_peer(&self, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }

        if let Some(key) = self.normalize(address).await {
            if self.peers.remove(&key).is_some() {
                self.store.delete_peer(&key);
                tracing::info!(address = %key, "Peer removed");
                return true;
            }
        }

        if self.peers.remove(address).is_some() {
            self.store.delete_peer(address);
            tracing::info!(address, "Peer removed by literal address");
            return true;
        }

        false
    }

    /// Snapshot of all peers, ordered by address.
    pub fn list_peers(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<PeerRecord> = self.peers.iter().map(|e| e.value().clone()).collect();
        peers.sort_by_key(|p| p.address());
        peers
    }

    /// Self first, then peers.
    pub fn views(&self) -> Vec<PeerView> {
        let mut views = Vec::with_capacity(self.peers.len() + 1);
        if let Some(me) = self.get_self() {
            views.push(PeerView::from(&me));
        }
        views.extend(self.list_peers().iter().map(PeerView::from));
        views
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<PeerRecord> {
        self.peers.get(address).map(|e| e.value().clone())
    }

    /// Record this node's own address. Any peer entry for it is dropped.
    pub async fn set_self(&self, address: &str) -> Option<String> {
        let (host, port) = resolve(address).await?;
        let key = format_address(&host, port);
        let mut record = PeerRecord::new(host, port);
        record.status = PeerStatus::SelfNode;

        *self.self_record.write().unwrap_or_else(|e| e.into_inner()) = Some(record);
        if self.peers.remove(&key).is_some() {
            tracing::debug!(address = %key, "Dropped peer entry that matches self");
        }
        tracing::info!(address = %key, "Self address set");
        Some(key)
    }

    pub fn get_self(&self) -> Option<PeerRecord> {
        self.self_record.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn mark_up(&self, address: &str) {
        if let Some(mut peer) = self.peers.get_mut(address) {
            if peer.status != PeerStatus::Up {
                tracing::info!(address, "Peer is up");
            }
            peer.status = PeerStatus::Up;
            peer.last_seen = Some(Utc::now());
        }
    }

    pub fn mark_down(&self, address: &str) {
        if let Some(mut peer) = self.peers.get_mut(address) {
            if peer.status != PeerStatus::Down {
                tracing::warn!(address, "Peer is down");
            }
            peer.status = PeerStatus::Down;
        }
    }

    /// Re-add peers saved by an earlier run (without re-persisting them).
    pub async fn load_persisted(&self) -> usize {
        let mut added = 0;
        for address in self.store.load_peers() {
            if self.add_peer(&address, false).await {
                added += 1;
            }
        }
        added
    }

    fn is_self(&self, key: &str) -> bool {
        self.get_self().map(|me| me.address() == key).unwrap_or(false)
    }
}

/// Split and resolve an address to `(canonical host, port)`.
async fn resolve(input: &str) -> Option<(String, u16)> {
    let (host, port) = split_host_port(input)?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some((ip.to_string(), port));
    }

    let looked_up = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map(|addrs| addrs.collect::<Vec<_>>());
    match looked_up {
        Ok(addrs) => {
            let chosen = addrs.iter().find(|a| a.is_ipv4()).or_else(|| addrs.first());
            match chosen {
                Some(addr) => Some((addr.ip().to_string(), port)),
                None => Some((host, port)),
            }
        }
        Err(e) => {
            tracing::debug!(host = %host, error = %e, "Peer host did not resolve; keeping literal");
            Some((host, port))
        }
    }
}

/// Parse `host`, `host:port`, `[v6]:port`, or `scheme://host:port/...`.
pub(crate) fn split_host_port(input: &str) -> Option<(String, u16)> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.contains("://") {
        let url = url::Url::parse(input).ok()?;
        let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']').to_string();
        let port = url.port_or_known_default().unwrap_or(DEFAULT_PEER_PORT);
        return (!host.is_empty()).then_some((host, port));
    }

    let (host, port) = if let Some(rest) = input.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.trim().parse().ok()?,
            None if after.is_empty() => DEFAULT_PEER_PORT,
            None => return None,
        };
        (host.to_string(), port)
    } else if input.matches(':').count() == 1 {
        let (host, port) = input.split_once(':')?;
        (host.trim().to_string(), port.trim().parse().ok()?)
    } else if input.contains(':') {
        // Bare IPv6 literal without a port.
        (input.to_string(), DEFAULT_PEER_PORT)
    } else {
        (input.to_string(), DEFAULT_PEER_PORT)
    };

    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }
    Some((host.to_ascii_lowercase(), port))
}
