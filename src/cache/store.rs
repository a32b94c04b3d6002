//! Cache Store Module
//!
//! TTL cache combining lazy expiry on read with a per-entry expiry timer.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::stats::CacheCounters;
use crate::cache::{CacheEntry, CacheStats};
use crate::error::CacheError;

// == Cache State ==
struct CacheState<K, V> {
    /// Key-value storage, stale entries included until removed
    entries: HashMap<K, CacheEntry<V>>,
    /// Last generation handed out
    generation: u64,
}

struct CacheInner<K, V> {
    state: Mutex<CacheState<K, V>>,
    counters: CacheCounters,
    default_ttl: Duration,
}

impl<K: Eq + Hash, V> CacheInner<K, V> {
    /// Timer callback: removes `key` only if it still holds `generation`.
    fn expire(&self, key: &K, generation: u64) -> bool {
        let mut state = self.state.lock();

        let current = state
            .entries
            .get(key)
            .is_some_and(|entry| entry.generation == generation);
        if !current {
            return false;
        }

        state.entries.remove(key);
        self.counters.expired(1);
        true
    }
}

// == TTL Cache ==
/// Key-value cache where every entry expires independently.
///
/// An entry is never returned once its age exceeds its TTL. Stale entries are
/// removed on read and, when a tokio runtime is available, by a timer that
/// fires once the TTL has elapsed. Cloning yields another handle to the same
/// cache.
pub struct TtlCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("default_ttl", &self.inner.default_ttl)
            .field("size", &self.inner.state.lock().entries.len())
            .finish()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates an empty cache. `default_ttl` must be non-zero.
    pub fn new(default_ttl: Duration) -> Result<Self, CacheError> {
        if default_ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }

        Ok(Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    generation: 0,
                }),
                counters: CacheCounters::default(),
                default_ttl,
            }),
        })
    }

    /// Creates a cache using the configured default TTL.
    pub fn from_config(config: &crate::config::Config) -> Result<Self, CacheError> {
        Self::new(config.cache_default_ttl())
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    // == Set ==
    /// Stores a value, replacing any previous entry for `key`.
    ///
    /// `ttl` defaults to the cache's default TTL; a zero TTL is rejected.
    /// The timer armed by a replaced entry will not remove the new one.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.inner.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }

        let generation = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state.generation += 1;
            let generation = state.generation;
            state
                .entries
                .insert(key.clone(), CacheEntry::new(value, ttl, generation));
            generation
        };

        self.schedule_expiry(key, generation, ttl);
        Ok(())
    }

    /// Arms the eager-expiry timer for one insertion.
    ///
    /// The task holds a weak reference so pending timers never keep a
    /// dropped cache alive.
    fn schedule_expiry(&self, key: K, generation: u64, ttl: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime, entry will expire lazily");
            return;
        };

        let cache: Weak<CacheInner<K, V>> = Arc::downgrade(&self.inner);
        runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = cache.upgrade() {
                if inner.expire(&key, generation) {
                    debug!(generation, "Expiry timer removed entry");
                }
            }
        });
    }

    // == Get ==
    /// Returns the value if present and not older than its TTL.
    ///
    /// A stale entry is removed as a side effect.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.inner.state.lock();

        let stale = match state.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.inner.counters.hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if stale {
            state.entries.remove(key);
            self.inner.counters.expired(1);
        }
        self.inner.counters.miss();
        None
    }

    /// True if `key` holds a live entry. Does not count as a hit or miss.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.inner.state.lock();
        state
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl_remaining<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.inner.state.lock();
        state
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.ttl_remaining())
    }

    // == Delete ==
    /// Removes the entry for `key`. Returns whether one was stored.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.state.lock().entries.remove(key).is_some()
    }

    // == Clear ==
    /// Removes every entry. Pending timers find nothing to remove.
    pub fn clear(&self) {
        self.inner.state.lock().entries.clear();
    }

    // == Size ==
    /// Number of stored entries, including stale ones not yet removed.
    pub fn size(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // == Purge Expired ==
    /// Removes all stale entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - state.entries.len();

        self.inner.counters.expired(removed);
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        self.inner.counters.snapshot(state.entries.len())
    }
}
