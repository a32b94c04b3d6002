//! Error types for the resource managers
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Boxed error produced by a resource factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Pool Error Enum ==
/// Errors surfaced by [`ResourcePool`](crate::pool::ResourcePool).
#[derive(Error, Debug)]
pub enum PoolError {
    /// Size limits are inconsistent
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The resource factory could not create a resource
    #[error("Failed to create resource: {0}")]
    Factory(#[source] BoxError),

    /// No resource became available before the deadline
    #[error("Timed out after {0:?} waiting for a resource")]
    Timeout(Duration),

    /// Every slot is in use and the pool is at capacity
    #[error("Pool is exhausted")]
    Exhausted,

    /// The pool has been shut down
    #[error("Pool is closed")]
    Closed,
}

/// Convenience Result type for pool operations.
pub type PoolResult<T> = std::result::Result<T, PoolError>;

// == Cache Error Enum ==
/// Errors surfaced by [`TtlCache`](crate::cache::TtlCache).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// TTL must be strictly positive
    #[error("TTL must be greater than zero")]
    InvalidTtl,

    /// Key rejected at the API boundary
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

// == API Error Enum ==
/// Error type returned by the diagnostics HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key not present in the cache
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Cache(_) => StatusCode::BAD_REQUEST,
            ApiError::Pool(PoolError::Timeout(_))
            | ApiError::Pool(PoolError::Exhausted)
            | ApiError::Pool(PoolError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// Convenience Result type for HTTP handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
