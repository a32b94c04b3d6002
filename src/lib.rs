//! Work-plan resource managers
//!
//! A bounded connection pool and a TTL cache shared by the request handlers
//! of the work-plan API backend, plus a small diagnostics HTTP surface.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod tasks;

pub use api::AppState;
pub use cache::TtlCache;
pub use config::Config;
pub use error::{ApiError, CacheError, PoolError, PoolResult};
pub use pool::{PoolConfig, PooledResource, ResourceManager, ResourcePool};
pub use tasks::spawn_reaper_task;
