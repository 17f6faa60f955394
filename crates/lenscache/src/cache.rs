//! ExpiringCache: string-keyed cache with time-based freshness

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ahash::RandomState;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::stats::CacheStats;

/// A cached value and the moment it was written
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// Cached value
    pub value: T,
    /// When the value was written
    pub captured_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Age of the entry at `now`. A clock that went backwards yields zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.captured_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Concurrent cache whose entries go stale after a fixed TTL.
///
/// Readers share the lock; `put` and `sweep` take it exclusively. A stale
/// entry is invisible to `get` but stays in the map until a sweep removes it.
pub struct ExpiringCache<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>, RandomState>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<T: Clone> ExpiringCache<T> {
    /// Create a cache stamped by the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache stamped by the given clock
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_hasher(RandomState::new())),
            ttl,
            clock,
            stats: CacheStats::new(),
        }
    }

    /// Look up a fresh value.
    ///
    /// Returns `None` if the key was never written or its entry is at least
    /// `ttl` old. Never removes anything.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let entries = self.entries.read();

        match entries.get(key) {
            Some(entry) if entry.age_at(now) < self.ttl => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                self.stats.record_stale();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Store a value, replacing any previous entry and restamping it
    pub fn put(&self, key: impl Into<String>, value: T) {
        let entry = CacheEntry {
            value,
            captured_at: self.clock.now(),
        };

        let mut entries = self.entries.write();
        entries.insert(key.into(), entry);
        self.stats.record_insert();
    }

    /// Remove every entry older than `ttl`, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = entry.age_at(now) <= self.ttl;
            if !keep {
                tracing::debug!(key = %key, "evicting expired entry");
            }
            keep
        });
        let removed = before - entries.len();

        self.stats.record_sweep(removed);
        removed
    }

    /// Raw stored entry, fresh or not
    pub fn entry(&self, key: &str) -> Option<CacheEntry<T>> {
        self.entries.read().get(key).cloned()
    }

    /// Number of stored entries, including stale ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry (statistics are kept)
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Time-to-live for entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<T> std::fmt::Debug for ExpiringCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("ttl", &self.ttl)
            .field("len", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}
