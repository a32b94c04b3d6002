//! Pool Configuration Module

use std::time::Duration;

use crate::error::{PoolError, PoolResult};

/// Sizing and timing parameters for a [`ResourcePool`](super::ResourcePool).
///
/// ```
/// use std::time::Duration;
/// use workplan_resources::pool::PoolConfig;
///
/// let config = PoolConfig::new()
///     .with_min_size(1)
///     .with_max_size(4)
///     .with_idle_timeout(Duration::from_secs(10));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of resources kept open regardless of idle time
    pub min_size: usize,
    /// Upper bound on resources, idle or checked out
    pub max_size: usize,
    /// Idle duration after which a resource above the floor may be closed
    pub idle_timeout: Duration,
    /// Maximum wait in `acquire`, `None` waits until a resource frees
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 10,
            idle_timeout: Duration::from_secs(30),
            acquire_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Checks that the size limits are usable.
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfig(
                "max_size must be at least 1".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(PoolError::InvalidConfig(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }
}
