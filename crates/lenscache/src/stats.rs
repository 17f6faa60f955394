//! Counters for expiring-cache behaviour

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by every cache operation
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    sweeps: AtomicU64,
}

/// Copy of the counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through, including stale ones
    pub misses: u64,
    /// Misses where an entry existed but had outlived its ttl
    pub stale: u64,
    /// Writes, counting overwrites
    pub inserts: u64,
    /// Entries removed by sweeps
    pub evictions: u64,
    /// Completed sweep passes
    pub sweeps: u64,
}

impl StatsSnapshot {
    /// Fraction of lookups served fresh, 0.0 when nothing was looked up
    pub fn hit_ratio(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

impl CacheStats {
    /// Zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A miss on an absent key
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A miss on a key whose entry is too old to serve
    pub(crate) fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self, removed: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Total fresh lookups
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total lookups that returned nothing
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Total entries removed by sweeps
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Read every counter. Counters are loaded one by one, so a snapshot
    /// taken under concurrent traffic may be slightly skewed between fields.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.stale,
            &self.inserts,
            &self.evictions,
            &self.sweeps,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
