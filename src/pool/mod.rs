//! Pool Module
//!
//! Bounded pool of expensive resources (database connections) with lazy
//! growth, FIFO waiting, idle eviction down to a floor and shutdown.

mod config;
mod manager;
mod slot;
mod stats;
mod store;
mod tcp;

pub use config::PoolConfig;
pub use manager::ResourceManager;
pub use stats::PoolStats;
pub use store::{PooledResource, ResourcePool};
pub use tcp::TcpConnector;
