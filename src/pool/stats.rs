//! Pool Statistics Module
//!
//! Lifetime counters and a point-in-time snapshot of pool occupancy.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Pool Counters ==
/// Monotonic counters updated by the pool.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub created: AtomicU64,
    pub evicted: AtomicU64,
    pub acquired: AtomicU64,
    pub timeouts: AtomicU64,
    pub factory_failures: AtomicU64,
}

impl PoolCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

// == Pool Stats ==
/// Snapshot of pool state returned by [`ResourcePool::stats`](super::ResourcePool::stats).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Slots currently tracked (idle + in use)
    pub size: usize,
    /// Slots ready to be handed out
    pub idle: usize,
    /// Slots checked out or being created
    pub in_use: usize,
    pub min_size: usize,
    pub max_size: usize,
    /// Resources opened over the pool's lifetime
    pub created: u64,
    /// Resources closed by idle cleanup
    pub evicted: u64,
    /// Successful acquisitions
    pub acquired: u64,
    /// Acquisitions that gave up waiting
    pub timeouts: u64,
    /// Factory errors surfaced to callers
    pub factory_failures: u64,
    pub closed: bool,
}

impl PoolStats {
    pub(crate) fn load_counters(mut self, counters: &PoolCounters) -> Self {
        self.created = counters.created.load(Ordering::Relaxed);
        self.evicted = counters.evicted.load(Ordering::Relaxed);
        self.acquired = counters.acquired.load(Ordering::Relaxed);
        self.timeouts = counters.timeouts.load(Ordering::Relaxed);
        self.factory_failures = counters.factory_failures.load(Ordering::Relaxed);
        self
    }

    // == Utilization ==
    /// Fraction of `max_size` currently checked out.
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.in_use as f64 / self.max_size as f64
        }
    }
}
