//! Cache Statistics Module
//!
//! Read and expiry counters kept beside the entry map, plus the snapshot
//! handed out by [`TtlCache::stats`](super::TtlCache::stats).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Counters ==
/// Lifetime counters. Updated without taking the entry lock.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl CacheCounters {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn expired(&self, count: usize) {
        if count > 0 {
            self.expirations.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Freezes the counters together with the current entry count.
    pub fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Cache Stats ==
/// Point-in-time view of cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a live value
    pub hits: u64,
    /// Reads of absent or stale keys
    pub misses: u64,
    /// Entries removed because their TTL elapsed, by read, purge or timer
    pub expirations: u64,
    /// Entries physically stored, stale ones included
    pub total_entries: usize,
}

impl CacheStats {
    /// Share of reads served from the cache; 0.0 before the first read.
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            reads => self.hits as f64 / reads as f64,
        }
    }
}
