//! Invalid address cache
//!
//! Bounded, time-expiring set of address ranges the device has rejected
//! with an application exception. Expired entries are purged lazily on
//! lookup, insert and snapshot; there is no background sweep.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Expiry horizon used when `now + ttl` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Modbus data area addressed by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    DiscreteInput,
    Coil,
    InputRegister,
    HoldingRegister,
}

impl AreaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscreteInput => "di",
            Self::Coil => "c",
            Self::InputRegister => "ir",
            Self::HoldingRegister => "hr",
        }
    }
}

/// Cache key: area, base address and element count of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuarantineKey {
    pub area: AreaKind,
    pub addr: u16,
    pub count: u16,
}

impl QuarantineKey {
    pub fn new(area: AreaKind, addr: u16, count: u16) -> Self {
        Self { area, addr, count }
    }
}

impl fmt::Display for QuarantineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.area.as_str(), self.addr, self.count)
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    expires_at: Instant,
    /// Insertion sequence, used to pick the eviction victim
    seq: u64,
}

/// Bounded TTL cache of quarantined address ranges
#[derive(Debug)]
pub struct InvalidAddressCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<QuarantineKey, Entry>,
    next_seq: u64,
}

impl InvalidAddressCache {
    /// Create a cache; `max_entries` is raised to 1 if zero
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `key` is quarantined, dropping it if it has expired
    pub fn is_quarantined(&mut self, key: &QuarantineKey) -> bool {
        let now = Instant::now();
        match self.entries.get(key) {
            None => false,
            Some(entry) if now >= entry.expires_at => {
                self.entries.remove(key);
                false
            },
            Some(_) => true,
        }
    }

    /// Quarantine `key` for one TTL from now
    ///
    /// Purges expired entries first. If the cache is still full, one entry
    /// is evicted to make room. Which entry goes is not part of the contract;
    /// currently it is the earliest inserted. Re-marking an existing key
    /// refreshes its expiry.
    pub fn mark(&mut self, key: QuarantineKey) {
        let now = Instant::now();
        self.purge_expired(now);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            if let Some(victim) = self.oldest_key() {
                self.entries.remove(&victim);
                debug!("Quarantine full, evicted {}", victim);
            }
        }

        let expires_at = now
            .checked_add(self.ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let seq = self.next_seq;
        self.entries
            .entry(key)
            .and_modify(|entry| entry.expires_at = expires_at)
            .or_insert(Entry { expires_at, seq });
        self.next_seq += 1;
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Live entries with their expiry instants, in insertion order
    pub fn snapshot(&mut self) -> Vec<(QuarantineKey, Instant)> {
        self.purge_expired(Instant::now());

        let mut items: Vec<_> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.seq, *key, entry.expires_at))
            .collect();
        items.sort_by_key(|(seq, _, _)| *seq);
        items
            .into_iter()
            .map(|(_, key, expires_at)| (key, expires_at))
            .collect()
    }

    fn purge_expired(&mut self, now: Instant) {
        self.entries.retain(|_, entry| now < entry.expires_at);
    }

    fn oldest_key(&self) -> Option<QuarantineKey> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(key, _)| *key)
    }
}

impl Default for InvalidAddressCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(600), 500)
    }
}
