//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::pool::PoolStats;

/// Response body for `GET /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for `PUT /cache`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for `DELETE /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    /// Whether an entry was actually removed
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, deleted: bool) -> Self {
        Self {
            key: key.into(),
            deleted,
        }
    }
}

/// Response body for `DELETE /cache`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

impl Default for ClearResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub pool: PoolStats,
    pub cache: CacheStats,
    /// Cache hit rate (hits / (hits + misses))
    pub cache_hit_rate: f64,
    /// Share of `max_size` currently checked out
    pub pool_utilization: f64,
}

impl StatsResponse {
    pub fn new(pool: PoolStats, cache: CacheStats) -> Self {
        Self {
            cache_hit_rate: cache.hit_rate(),
            pool_utilization: pool.utilization(),
            pool,
            cache,
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Why the backend check failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            detail: None,
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            detail: Some(detail.into()),
        }
    }
}
