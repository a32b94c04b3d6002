//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;
use crate::error::CacheError;

/// Request body for `PUT /cache`
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl_ms`: Optional TTL in milliseconds (uses the default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl SetRequest {
    /// Validates the key. TTL validation is left to the cache.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.key.is_empty() {
            return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidKey(format!(
                "key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}
