//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, get_handler, health_handler, set_handler, stats_handler,
    AppState,
};
use crate::pool::ResourceManager;

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router<M: ResourceManager>(state: AppState<M>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler::<M>))
        .route("/stats", get(stats_handler::<M>))
        .route("/cache", put(set_handler::<M>).delete(clear_handler::<M>))
        .route(
            "/cache/:key",
            get(get_handler::<M>).delete(delete_handler::<M>),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
