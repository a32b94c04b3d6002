//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::warn;

use crate::cache::TtlCache;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};
use crate::pool::{ResourceManager, ResourcePool};

/// Longest the health check waits for a pooled connection.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// Application state shared across all handlers.
///
/// Both managers are cheap handles onto shared state, so cloning the state
/// per request is free.
pub struct AppState<M: ResourceManager> {
    pub pool: ResourcePool<M>,
    pub cache: TtlCache<String, Value>,
}

impl<M: ResourceManager> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<M: ResourceManager> AppState<M> {
    pub fn new(pool: ResourcePool<M>, cache: TtlCache<String, Value>) -> Self {
        Self { pool, cache }
    }
}

/// Handler for GET /health
///
/// Healthy when a backend connection can be checked out in time.
pub async fn health_handler<M: ResourceManager>(
    State(state): State<AppState<M>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.pool.acquire_timeout(HEALTH_CHECK_TIMEOUT).await {
        Ok(conn) => {
            state.pool.release(conn);
            (StatusCode::OK, Json(HealthResponse::healthy()))
        }
        Err(err) => {
            warn!("Health check failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::degraded(err.to_string())),
            )
        }
    }
}

/// Handler for GET /stats
pub async fn stats_handler<M: ResourceManager>(
    State(state): State<AppState<M>>,
) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.pool.stats(), state.cache.stats()))
}

/// Handler for PUT /cache
pub async fn set_handler<M: ResourceManager>(
    State(state): State<AppState<M>>,
    Json(req): Json<SetRequest>,
) -> ApiResult<Json<SetResponse>> {
    req.validate()?;

    let ttl = req.ttl();
    state.cache.set(req.key.clone(), req.value, ttl)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
pub async fn get_handler<M: ResourceManager>(
    State(state): State<AppState<M>>,
    Path(key): Path<String>,
) -> ApiResult<Json<GetResponse>> {
    let value = state
        .cache
        .get(&key)
        .ok_or_else(|| ApiError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /cache/:key
///
/// Deleting a missing key succeeds with `deleted: false`.
pub async fn delete_handler<M: ResourceManager>(
    State(state): State<AppState<M>>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let deleted = state.cache.delete(&key);
    Json(DeleteResponse::new(key, deleted))
}

/// Handler for DELETE /cache
pub async fn clear_handler<M: ResourceManager>(
    State(state): State<AppState<M>>,
) -> Json<ClearResponse> {
    state.cache.clear();
    Json(ClearResponse::new())
}
