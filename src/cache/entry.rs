//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion time
    pub created_at: Instant,
    /// Lifetime, always non-zero
    pub ttl: Duration,
    /// Cache-wide sequence number identifying this insertion
    pub generation: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    pub fn new(value: V, ttl: Duration, generation: u64) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
            generation,
        }
    }

    /// Time elapsed since insertion.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry stays live while its age is at most its TTL, so expiry is
    /// strictly after `created_at + ttl`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Expiry check against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }

    // == Time To Live ==
    /// Returns remaining lifetime, `Duration::ZERO` once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.age())
    }
}
