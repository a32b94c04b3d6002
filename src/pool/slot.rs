//! Pool Slot Module
//!
//! One entry of the pool's ordered handle list.

use std::time::{Duration, Instant};

// == Slot ==
/// Bookkeeping for a single pooled resource.
///
/// While the resource is checked out it lives in the caller's guard and
/// `resource` is `None`. A freshly reserved slot (resource still being
/// created) is also `in_use` with no resource.
#[derive(Debug)]
pub(crate) struct Slot<R> {
    /// Stable identifier, unique within one pool
    pub id: u64,
    /// The resource while the pool owns it
    pub resource: Option<R>,
    /// Checked out (or being created)
    pub in_use: bool,
    /// Last check-out or check-in time
    pub last_released_at: Instant,
}

impl<R> Slot<R> {
    /// Creates an idle slot holding `resource`.
    pub fn idle(id: u64, resource: R) -> Self {
        Self {
            id,
            resource: Some(resource),
            in_use: false,
            last_released_at: Instant::now(),
        }
    }

    /// Creates an in-use slot whose resource is still being opened.
    pub fn reserved(id: u64) -> Self {
        Self {
            id,
            resource: None,
            in_use: true,
            last_released_at: Instant::now(),
        }
    }

    /// True when the slot can be handed to a caller.
    pub fn is_available(&self) -> bool {
        !self.in_use && self.resource.is_some()
    }

    // == Check Out ==
    /// Marks the slot in use and takes its resource.
    pub fn check_out(&mut self) -> Option<R> {
        let resource = self.resource.take()?;
        self.in_use = true;
        self.last_released_at = Instant::now();
        Some(resource)
    }

    // == Check In ==
    /// Stores the resource back and marks the slot idle.
    pub fn check_in(&mut self, resource: R) {
        self.resource = Some(resource);
        self.in_use = false;
        self.last_released_at = Instant::now();
    }

    // == Is Evictable ==
    /// Idle for strictly longer than `idle_timeout` as of `now`.
    pub fn is_evictable(&self, now: Instant, idle_timeout: Duration) -> bool {
        !self.in_use && now.saturating_duration_since(self.last_released_at) > idle_timeout
    }
}
