//! Resource Pool Module
//!
//! Bounded pool of reusable resources with lazy growth, FIFO waiting,
//! release-driven idle eviction and terminal shutdown.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, info, warn};

use super::slot::Slot;
use super::stats::{PoolCounters, PoolStats};
use super::{PoolConfig, ResourceManager};
use crate::error::{PoolError, PoolResult};

// == Pool State ==
/// Mutable state guarded by the pool mutex.
struct PoolState<R> {
    /// Slots in creation order
    slots: Vec<Slot<R>>,
    next_id: u64,
    closed: bool,
}

impl<R> PoolState<R> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn remove_slot(&mut self, slot_id: u64) -> Option<Slot<R>> {
        let index = self.slots.iter().position(|slot| slot.id == slot_id)?;
        Some(self.slots.remove(index))
    }
}

struct PoolInner<M: ResourceManager> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Resource>>,
    /// One permit per slot a caller may hold; waiters queue here in FIFO order
    permits: Arc<Semaphore>,
    counters: PoolCounters,
}

impl<M: ResourceManager> PoolInner<M> {
    // == Check In ==
    /// Returns a resource to its slot and runs cleanup.
    ///
    /// A resource whose slot no longer exists (pool closed) is destroyed.
    fn check_in(&self, slot_id: u64, resource: M::Resource) {
        let orphan = {
            let mut state = self.state.lock();
            let closed = state.closed;
            match state.slots.iter_mut().find(|slot| slot.id == slot_id) {
                Some(slot) if !closed => {
                    slot.check_in(resource);
                    None
                }
                _ => Some(resource),
            }
        };

        match orphan {
            Some(resource) => {
                debug!(slot_id, "Destroying resource released after pool close");
                self.manager.destroy(resource);
            }
            None => {
                debug!(slot_id, "Resource released");
                self.cleanup();
            }
        }
    }

    /// Drops the bookkeeping for a slot that no longer has a resource.
    fn forget_slot(&self, slot_id: u64) {
        self.state.lock().remove_slot(slot_id);
    }

    // == Replenish ==
    /// Opens idle resources until the pool is back at `min_size`.
    ///
    /// Each new resource holds a permit while it is being created, so a
    /// saturated pool is left alone.
    async fn replenish(&self) -> PoolResult<usize> {
        let mut opened = 0;
        loop {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };

            let slot_id = {
                let mut state = self.state.lock();
                if state.closed || state.slots.len() >= self.config.min_size {
                    break;
                }
                let slot_id = state.allocate_id();
                state.slots.push(Slot::reserved(slot_id));
                slot_id
            };

            let mut reservation = Reservation {
                inner: self,
                slot_id,
                armed: true,
            };
            let resource = match self.manager.create().await {
                Ok(resource) => resource,
                Err(err) => {
                    PoolCounters::bump(&self.counters.factory_failures);
                    warn!("Failed to open replacement resource: {}", err);
                    return Err(PoolError::Factory(Box::new(err)));
                }
            };
            reservation.armed = false;
            PoolCounters::bump(&self.counters.created);

            let orphan = {
                let mut state = self.state.lock();
                let closed = state.closed;
                match state.slots.iter_mut().find(|slot| slot.id == slot_id) {
                    Some(slot) if !closed => {
                        slot.check_in(resource);
                        None
                    }
                    _ => Some(resource),
                }
            };
            drop(permit);

            if let Some(resource) = orphan {
                self.manager.destroy(resource);
                break;
            }
            opened += 1;
        }

        if opened > 0 {
            debug!("Pool replenished with {} resources", opened);
        }
        Ok(opened)
    }

    // == Cleanup ==
    fn cleanup(&self) -> usize {
        let evicted: Vec<M::Resource> = {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }

            let budget = state.slots.len().saturating_sub(self.config.min_size);
            if budget == 0 {
                return 0;
            }

            let now = Instant::now();
            let mut candidates: Vec<(Instant, u64)> = state
                .slots
                .iter()
                .filter(|slot| slot.is_evictable(now, self.config.idle_timeout))
                .map(|slot| (slot.last_released_at, slot.id))
                .collect();
            if candidates.is_empty() {
                return 0;
            }

            // Oldest release first
            candidates.sort_by_key(|(released_at, _)| *released_at);
            candidates.truncate(budget);

            let mut evicted = Vec::with_capacity(candidates.len());
            state.slots.retain_mut(|slot| {
                if candidates.iter().any(|(_, id)| *id == slot.id) {
                    if let Some(resource) = slot.resource.take() {
                        evicted.push(resource);
                    }
                    false
                } else {
                    true
                }
            });
            evicted
        };

        let count = evicted.len();
        for resource in evicted {
            self.manager.destroy(resource);
        }

        if count > 0 {
            PoolCounters::add(&self.counters.evicted, count);
            debug!("Pool cleanup: evicted {} idle resources", count);
        }
        count
    }
}

// == Resource Pool ==
/// Bounded pool of resources produced by a [`ResourceManager`].
///
/// Cloning is cheap and yields another handle to the same pool, so one pool
/// is built at startup and passed to every consumer.
pub struct ResourcePool<M: ResourceManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ResourceManager> Clone for ResourcePool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ResourceManager> fmt::Debug for ResourcePool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<M: ResourceManager> ResourcePool<M> {
    // == Constructor ==
    /// Creates a pool and eagerly opens `min_size` resources.
    ///
    /// If any of the initial resources cannot be opened, the ones already
    /// opened are destroyed and the factory error is returned.
    pub async fn new(manager: M, config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let mut initial = Vec::with_capacity(config.min_size);
        for _ in 0..config.min_size {
            match manager.create().await {
                Ok(resource) => initial.push(resource),
                Err(err) => {
                    warn!("Failed to open initial pool resource: {}", err);
                    for resource in initial {
                        manager.destroy(resource);
                    }
                    return Err(PoolError::Factory(Box::new(err)));
                }
            }
        }

        let slots: Vec<Slot<M::Resource>> = initial
            .into_iter()
            .enumerate()
            .map(|(id, resource)| Slot::idle(id as u64, resource))
            .collect();
        let next_id = slots.len() as u64;

        let counters = PoolCounters::default();
        PoolCounters::add(&counters.created, slots.len());

        info!(
            "Resource pool ready: min_size={}, max_size={}, idle_timeout={:?}",
            config.min_size, config.max_size, config.idle_timeout
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                permits: Arc::new(Semaphore::new(config.max_size)),
                config,
                state: Mutex::new(PoolState {
                    slots,
                    next_id,
                    closed: false,
                }),
                counters,
            }),
        })
    }

    // == Acquire ==
    /// Checks out a resource, waiting in FIFO order while the pool is saturated.
    ///
    /// The wait is bounded by the configured `acquire_timeout`, if any.
    /// Dropping the returned future abandons the wait without side effects.
    pub async fn acquire(&self) -> PoolResult<PooledResource<M>> {
        match self.inner.config.acquire_timeout {
            Some(timeout) => self.acquire_timeout(timeout).await,
            None => self.acquire_unbounded().await,
        }
    }

    /// Checks out a resource, giving up after `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledResource<M>> {
        match tokio::time::timeout(timeout, self.acquire_unbounded()).await {
            Ok(result) => result,
            Err(_) => {
                PoolCounters::bump(&self.inner.counters.timeouts);
                warn!("Timed out after {:?} waiting for a pooled resource", timeout);
                Err(PoolError::Timeout(timeout))
            }
        }
    }

    /// Checks out a resource only if one is available or can be created now.
    pub async fn try_acquire(&self) -> PoolResult<PooledResource<M>> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let permit = match Arc::clone(&self.inner.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => return Err(PoolError::Exhausted),
            Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
        };
        self.check_out(permit).await
    }

    async fn acquire_unbounded(&self) -> PoolResult<PooledResource<M>> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        self.check_out(permit).await
    }

    /// Hands out the first idle slot, or grows the pool by one.
    ///
    /// Holding a permit guarantees that either a slot is idle or the pool is
    /// below `max_size`.
    async fn check_out(&self, permit: OwnedSemaphorePermit) -> PoolResult<PooledResource<M>> {
        let claim = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }

            let idle = state
                .slots
                .iter_mut()
                .find(|slot| slot.is_available())
                .and_then(|slot| slot.check_out().map(|resource| (slot.id, resource)));

            match idle {
                Some((slot_id, resource)) => Claim::Idle(slot_id, resource),
                None if state.slots.len() < self.inner.config.max_size => {
                    let slot_id = state.allocate_id();
                    state.slots.push(Slot::reserved(slot_id));
                    Claim::Reserved(slot_id)
                }
                None => return Err(PoolError::Exhausted),
            }
        };

        let reserved_id = match claim {
            Claim::Idle(slot_id, resource) => {
                debug!(slot_id, "Reusing idle resource");
                return Ok(self.hand_out(slot_id, resource, permit));
            }
            Claim::Reserved(slot_id) => slot_id,
        };

        let mut reservation = Reservation {
            inner: self.inner.as_ref(),
            slot_id: reserved_id,
            armed: true,
        };

        let resource = match self.inner.manager.create().await {
            Ok(resource) => resource,
            Err(err) => {
                PoolCounters::bump(&self.inner.counters.factory_failures);
                warn!("Failed to open pool resource: {}", err);
                return Err(PoolError::Factory(Box::new(err)));
            }
        };

        // The pool may have been closed while the factory was running
        let still_open = {
            let state = self.inner.state.lock();
            !state.closed && state.slots.iter().any(|slot| slot.id == reserved_id)
        };
        if !still_open {
            self.inner.manager.destroy(resource);
            return Err(PoolError::Closed);
        }

        reservation.armed = false;
        PoolCounters::bump(&self.inner.counters.created);
        debug!(slot_id = reserved_id, "Opened new pooled resource");
        Ok(self.hand_out(reserved_id, resource, permit))
    }

    fn hand_out(
        &self,
        slot_id: u64,
        resource: M::Resource,
        permit: OwnedSemaphorePermit,
    ) -> PooledResource<M> {
        PoolCounters::bump(&self.inner.counters.acquired);
        PooledResource {
            resource: Some(resource),
            slot_id,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    // == Release ==
    /// Returns a checked-out resource to the pool.
    ///
    /// Equivalent to dropping the guard.
    pub fn release(&self, resource: PooledResource<M>) {
        drop(resource);
    }

    // == Cleanup ==
    /// Closes idle resources older than `idle_timeout`, oldest first,
    /// without going below `min_size`. Returns the number closed.
    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    /// Opens idle resources until `min_size` is reached again.
    ///
    /// Only detached resources take the pool below its floor, and detaching
    /// already schedules this in the background. Returns the number opened.
    pub async fn replenish(&self) -> PoolResult<usize> {
        self.inner.replenish().await
    }

    // == Close All ==
    /// Shuts the pool down.
    ///
    /// Idle resources are destroyed now, checked-out resources when they are
    /// released. Pending and future acquisitions fail with
    /// [`PoolError::Closed`]. Calling this twice is harmless.
    pub fn close_all(&self) {
        let drained: Vec<M::Resource> = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state
                .slots
                .drain(..)
                .filter_map(|slot| slot.resource)
                .collect()
        };

        self.inner.permits.close();

        let count = drained.len();
        for resource in drained {
            self.inner.manager.destroy(resource);
        }
        info!("Resource pool closed: destroyed {} idle resources", count);
    }

    // == Introspection ==
    /// Number of slots, idle or in use.
    pub fn size(&self) -> usize {
        self.inner.state.lock().slots.len()
    }

    pub fn idle_count(&self) -> usize {
        let state = self.inner.state.lock();
        state.slots.iter().filter(|slot| !slot.in_use).count()
    }

    pub fn in_use_count(&self) -> usize {
        let state = self.inner.state.lock();
        state.slots.iter().filter(|slot| slot.in_use).count()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Returns a snapshot of occupancy and lifetime counters.
    pub fn stats(&self) -> PoolStats {
        let (size, idle, closed) = {
            let state = self.inner.state.lock();
            let idle = state.slots.iter().filter(|slot| !slot.in_use).count();
            (state.slots.len(), idle, state.closed)
        };

        PoolStats {
            size,
            idle,
            in_use: size - idle,
            min_size: self.inner.config.min_size,
            max_size: self.inner.config.max_size,
            closed,
            ..PoolStats::default()
        }
        .load_counters(&self.inner.counters)
    }
}

/// Outcome of scanning the slot list under the lock.
enum Claim<R> {
    /// An idle slot was checked out
    Idle(u64, R),
    /// A new slot was reserved and needs a resource
    Reserved(u64),
}

// == Reservation ==
/// Removes a reserved slot unless creation completes.
///
/// Covers both factory errors and the acquiring future being dropped while
/// the factory is still running.
struct Reservation<'a, M: ResourceManager> {
    inner: &'a PoolInner<M>,
    slot_id: u64,
    armed: bool,
}

impl<M: ResourceManager> Drop for Reservation<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.forget_slot(self.slot_id);
        }
    }
}

// == Pooled Resource ==
/// A checked-out resource. Returns itself to the pool when dropped.
pub struct PooledResource<M: ResourceManager> {
    resource: Option<M::Resource>,
    slot_id: u64,
    pool: Arc<PoolInner<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: ResourceManager> PooledResource<M> {
    /// Identifier of the slot this resource belongs to.
    pub fn slot_id(&self) -> u64 {
        self.slot_id
    }

    /// Returns the resource to the pool.
    pub fn release(self) {
        drop(self);
    }

    /// Removes the resource from the pool and hands it to the caller.
    ///
    /// Use this for resources that turned out to be broken. The pool frees
    /// the slot and, when that leaves it below `min_size`, opens a
    /// replacement in the background.
    pub fn detach(mut self) -> M::Resource {
        self.pool.forget_slot(self.slot_id);
        self.schedule_replenish();
        self.resource
            .take()
            .expect("pooled resource present until dropped")
    }

    fn schedule_replenish(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime, pool stays below min_size until replenished");
            return;
        };

        let pool = Arc::clone(&self.pool);
        runtime.spawn(async move {
            if let Err(err) = pool.replenish().await {
                warn!("Background replenish failed: {}", err);
            }
        });
    }
}

impl<M: ResourceManager> Deref for PooledResource<M> {
    type Target = M::Resource;

    fn deref(&self) -> &Self::Target {
        self.resource
            .as_ref()
            .expect("pooled resource present until dropped")
    }
}

impl<M: ResourceManager> DerefMut for PooledResource<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource
            .as_mut()
            .expect("pooled resource present until dropped")
    }
}

impl<M: ResourceManager> Drop for PooledResource<M> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.check_in(self.slot_id, resource);
        }
    }
}

impl<M: ResourceManager> fmt::Debug for PooledResource<M>
where
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledResource")
            .field("slot_id", &self.slot_id)
            .field("resource", &self.resource)
            .finish()
    }
}
