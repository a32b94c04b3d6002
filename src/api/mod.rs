//! API Module
//!
//! Diagnostics HTTP surface over the shared pool and cache.
//!
//! # Endpoints
//! - `GET /health` - Checks a backend connection out of the pool
//! - `GET /stats` - Pool and cache statistics
//! - `PUT /cache` - Store a value
//! - `GET /cache/:key` - Read a value
//! - `DELETE /cache/:key` - Delete a key
//! - `DELETE /cache` - Clear the cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
