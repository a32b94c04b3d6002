//! Cache Module
//!
//! Provides in-memory caching with per-entry TTL, lazy expiry on read and
//! timer-driven removal.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::TtlCache;

// == Public Constants ==
/// Maximum allowed key length in bytes at the HTTP boundary
pub const MAX_KEY_LENGTH: usize = 256;
