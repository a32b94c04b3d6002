//! Configuration Module
//!
//! Handles loading pool, cache and server settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::PoolConfig;

/// Process configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Durations are expressed in milliseconds.
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum number of pooled connections kept open
    pub pool_min_size: usize,
    /// Maximum number of pooled connections
    pub pool_max_size: usize,
    /// Idle time before a connection above the floor may be closed
    pub pool_idle_timeout_ms: u64,
    /// Upper bound on waiting for a connection, 0 = wait forever
    pub pool_acquire_timeout_ms: u64,
    /// Interval of the background reaper, 0 = disabled
    pub pool_reap_interval_ms: u64,
    /// Default TTL for cache entries
    pub cache_default_ttl_ms: u64,
    /// Address of the backing store
    pub backend_addr: String,
    /// TCP connect timeout for new backend connections
    pub backend_connect_timeout_ms: u64,
    /// Diagnostics HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `POOL_MIN_SIZE` (default: 2)
    /// - `POOL_MAX_SIZE` (default: 10)
    /// - `POOL_IDLE_TIMEOUT_MS` (default: 30000)
    /// - `POOL_ACQUIRE_TIMEOUT_MS` (default: 30000)
    /// - `POOL_REAP_INTERVAL_MS` (default: 0)
    /// - `CACHE_DEFAULT_TTL_MS` (default: 300000)
    /// - `BACKEND_ADDR` (default: 127.0.0.1:3306)
    /// - `BACKEND_CONNECT_TIMEOUT_MS` (default: 5000)
    /// - `SERVER_PORT` (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pool_min_size: env_or("POOL_MIN_SIZE", defaults.pool_min_size),
            pool_max_size: env_or("POOL_MAX_SIZE", defaults.pool_max_size),
            pool_idle_timeout_ms: env_or("POOL_IDLE_TIMEOUT_MS", defaults.pool_idle_timeout_ms),
            pool_acquire_timeout_ms: env_or(
                "POOL_ACQUIRE_TIMEOUT_MS",
                defaults.pool_acquire_timeout_ms,
            ),
            pool_reap_interval_ms: env_or("POOL_REAP_INTERVAL_MS", defaults.pool_reap_interval_ms),
            cache_default_ttl_ms: env_or("CACHE_DEFAULT_TTL_MS", defaults.cache_default_ttl_ms),
            backend_addr: env::var("BACKEND_ADDR").unwrap_or(defaults.backend_addr),
            backend_connect_timeout_ms: env_or(
                "BACKEND_CONNECT_TIMEOUT_MS",
                defaults.backend_connect_timeout_ms,
            ),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Builds the pool settings.
    pub fn pool_config(&self) -> PoolConfig {
        let acquire_timeout = match self.pool_acquire_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        PoolConfig::new()
            .with_min_size(self.pool_min_size)
            .with_max_size(self.pool_max_size)
            .with_idle_timeout(Duration::from_millis(self.pool_idle_timeout_ms))
            .with_acquire_timeout(acquire_timeout)
    }

    /// Default cache TTL.
    pub fn cache_default_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_default_ttl_ms)
    }

    /// Reaper interval, `None` when disabled.
    pub fn reap_interval(&self) -> Option<Duration> {
        match self.pool_reap_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn backend_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_connect_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_min_size: 2,
            pool_max_size: 10,
            pool_idle_timeout_ms: 30_000,
            pool_acquire_timeout_ms: 30_000,
            pool_reap_interval_ms: 0,
            cache_default_ttl_ms: 5 * 60 * 1000,
            backend_addr: "127.0.0.1:3306".to_string(),
            backend_connect_timeout_ms: 5_000,
            server_port: 3000,
        }
    }
}

/// Reads and parses an environment variable, falling back to `default`.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.pool_min_size, 2);
        assert_eq!(config.pool_max_size, 10);
        assert_eq!(config.pool_idle_timeout_ms, 30_000);
        assert_eq!(config.cache_default_ttl_ms, 300_000);
        assert_eq!(config.server_port, 3000);
        assert!(config.reap_interval().is_none());
    }

    #[test]
    fn test_pool_config_from_config() {
        let config = Config {
            pool_acquire_timeout_ms: 0,
            ..Config::default()
        };
        let pool = config.pool_config();
        assert_eq!(pool.min_size, 2);
        assert_eq!(pool.max_size, 10);
        assert_eq!(pool.idle_timeout, Duration::from_secs(30));
        assert!(pool.acquire_timeout.is_none());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("WORKPLAN_TEST_GARBAGE", "not-a-number");
        let value: usize = env_or("WORKPLAN_TEST_GARBAGE", 7);
        assert_eq!(value, 7);

        env::set_var("WORKPLAN_TEST_NUMBER", "12");
        let value: usize = env_or("WORKPLAN_TEST_NUMBER", 7);
        assert_eq!(value, 12);
    }
}
