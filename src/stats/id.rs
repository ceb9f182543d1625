//! Time-ordered 64-bit event ids.
//!
//! `id = (unix_millis << sequence_bits) | (counter mod 2^sequence_bits)`
//!
//! Ids are unique within one process while fewer than `2^sequence_bits` are
//! drawn in the same millisecond. Past that the counter wraps without error;
//! a collision only means a set union sees a duplicate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_SEQUENCE_BITS: u32 = 20;

#[derive(Debug)]
pub struct IdGenerator {
    counter: AtomicU64,
    sequence_bits: u32,
}

impl IdGenerator {
    pub fn new(sequence_bits: u32) -> Self {
        Self {
            counter: AtomicU64::new(0),
            sequence_bits: sequence_bits.min(32),
        }
    }

    pub fn sequence_bits(&self) -> u32 {
        self.sequence_bits
    }

    pub fn next_id(&self) -> u64 {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.next_id_at(now_ms)
    }

    /// Draw an id for an explicit millisecond timestamp.
    pub fn next_id_at(&self, millis: u64) -> u64 {
        let mask = (1u64 << self.sequence_bits) - 1;
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) & mask;
        (millis << self.sequence_bits) | seq
    }

    /// Millisecond timestamp encoded in an id.
    pub fn timestamp_of(&self, id: u64) -> u64 {
        id >> self.sequence_bits
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_BITS)
    }
}
