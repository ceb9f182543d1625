//! Grow-only id set and the statistics facade around it.
//!
//! # Responsibilities
//! - Record an id for every served request
//! - Union ids received from peers, counting the new ones
//! - Render the `{"timestamps":[...]}` sync envelope (full or last N)
//!
//! # Design Decisions
//! - The set only shrinks through the explicit admin `clear`
//! - Merge is idempotent: re-applying a payload adds nothing
//! - Payload parsing is tolerant: bad entries are skipped one by one

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::persistence::{IdOrigin, Persistence};
use crate::stats::id::IdGenerator;

/// Wire envelope for id exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampsPayload {
    pub timestamps: Vec<u64>,
}

/// Concurrency-safe ordered set of ids.
#[derive(Debug, Default)]
pub struct IdSet {
    ids: RwLock<BTreeSet<u64>>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert; true if the id was not present.
    pub fn insert(&self, id: u64) -> bool {
        self.ids.write().unwrap_or_else(|e| e.into_inner()).insert(id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.read().unwrap_or_else(|e| e.into_inner()).contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All ids in ascending order.
    pub fn snapshot(&self) -> Vec<u64> {
        self.ids.read().unwrap_or_else(|e| e.into_inner()).iter().copied().collect()
    }

    /// The `n` largest ids, ascending.
    pub fn last(&self, n: usize) -> Vec<u64> {
        let ids = self.ids.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<u64> = ids.iter().rev().take(n).copied().collect();
        out.reverse();
        out
    }

    fn clear(&self) {
        self.ids.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Request statistics shared by the request path, the sync endpoint, and
/// the sync scheduler.
pub struct Statistics {
    ids: IdSet,
    generator: IdGenerator,
    store: Arc<dyn Persistence>,
}

impl Statistics {
    /// Build the set, loading previously persisted ids.
    pub fn new(generator: IdGenerator, store: Arc<dyn Persistence>) -> Self {
        let ids = IdSet::new();
        let loaded = store.load_ids();
        let count = loaded.len();
        for id in loaded {
            ids.insert(id);
        }
        if count > 0 {
            tracing::info!(count, "Loaded request ids from persistence");
        }
        Self { ids, generator, store }
    }

    /// Record a served request; returns its new id.
    pub fn log_request(&self, method: &str, target: &str) -> u64 {
        let id = self.generator.next_id();
        if self.ids.insert(id) {
            self.store.save_id(id, IdOrigin::Local);
        }
        tracing::debug!(id, method, target, "Logged request");
        id
    }

    /// Union remote ids into the set; returns how many were new.
    pub fn merge<I: IntoIterator<Item = u64>>(&self, remote: I) -> usize {
        let mut added = 0;
        for id in remote {
            if self.ids.insert(id) {
                self.store.save_id(id, IdOrigin::Merged);
                added += 1;
            }
        }
        if added > 0 {
            tracing::info!(added, total = self.total(), "Merged external ids");
        }
        added
    }

    /// Parse a `{"timestamps":[...]}` body and merge it.
    pub fn merge_payload(&self, body: &str) -> usize {
        self.merge(parse_timestamps(body))
    }

    pub fn total(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> Vec<u64> {
        self.ids.snapshot()
    }

    pub fn payload(&self) -> TimestampsPayload {
        TimestampsPayload {
            timestamps: self.ids.snapshot(),
        }
    }

    /// The most recent `n` ids.
    pub fn payload_last(&self, n: usize) -> TimestampsPayload {
        TimestampsPayload {
            timestamps: self.ids.last(n),
        }
    }

    /// Admin bulk clear.
    pub fn clear(&self) {
        self.ids.clear();
        self.store.clear_ids();
        tracing::warn!("Request statistics cleared");
    }
}

/// Extract ids from a sync envelope.
///
/// Accepts numbers and numeric strings; skips anything else. When the body
/// is not valid JSON the first `[...]` span is scanned instead.
pub fn parse_timestamps(body: &str) -> Vec<u64> {
    let body = body.trim();
    if body.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("timestamps") {
            Some(Value::Array(items)) => items.iter().filter_map(id_from_value).collect(),
            _ => Vec::new(),
        },
        Ok(Value::Array(items)) => items.iter().filter_map(id_from_value).collect(),
        Ok(_) => Vec::new(),
        Err(_) => scan_bracketed(body),
    }
}

fn id_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scan_bracketed(body: &str) -> Vec<u64> {
    let Some(start) = body.find('[') else {
        return Vec::new();
    };
    let Some(len) = body[start..].find(']') else {
        return Vec::new();
    };
    body[start + 1..start + len]
        .split(',')
        .filter_map(|part| part.trim().trim_matches('"').parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, NoopStore};

    fn stats() -> Statistics {
        Statistics::new(IdGenerator::default(), Arc::new(NoopStore))
    }

    #[test]
    fn merge_is_idempotent() {
        let s = stats();
        let payload = r#"{"timestamps":[5,6,7]}"#;
        assert_eq!(s.merge_payload(payload), 3);
        assert_eq!(s.merge_payload(payload), 0);
        assert_eq!(s.total(), 3);
    }

    #[test]
    fn bad_entries_are_skipped() {
        let s = stats();
        let added = s.merge_payload(r#"{"timestamps":[1,"2","x",-4,3.5,null,9]}"#);
        assert_eq!(added, 3);
        assert_eq!(s.ids(), vec![1, 2, 9]);
    }

    #[test]
    fn malformed_envelope_falls_back_to_scan() {
        assert_eq!(parse_timestamps("{\"timestamps\":[10, 11, oops, 12]"), vec![10, 11, 12]);
        assert!(parse_timestamps("no list here").is_empty());
        assert!(parse_timestamps("").is_empty());
    }

    #[test]
    fn payload_last_returns_most_recent_ascending() {
        let s = stats();
        s.merge([4, 1, 3, 2, 5]);
        assert_eq!(s.payload_last(2).timestamps, vec![4, 5]);
        assert_eq!(s.payload_last(0).timestamps, Vec::<u64>::new());
        assert_eq!(s.payload_last(10).timestamps, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            serde_json::to_string(&s.payload_last(2)).unwrap(),
            r#"{"timestamps":[4,5]}"#
        );
    }

    #[test]
    fn logged_requests_persist_and_reload() {
        let store = Arc::new(MemoryStore::new());
        let s = Statistics::new(IdGenerator::default(), store.clone());
        let a = s.log_request("GET", "/");
        let b = s.log_request("GET", "/about");
        assert_ne!(a, b);

        let reloaded = Statistics::new(IdGenerator::default(), store.clone());
        assert!(reloaded.contains(a) && reloaded.contains(b));

        reloaded.clear();
        assert_eq!(reloaded.total(), 0);
        assert!(store.load_ids().is_empty());
    }
}
