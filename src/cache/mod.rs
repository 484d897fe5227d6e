//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, pluggable eviction and
//! tag-based invalidation.

mod engine;
mod entry;
mod eviction;
mod pattern;
mod stats;
mod store;


// Re-export public types
pub use engine::CacheEngine;
pub use entry::{CacheEntry, Lookup, Payload, ValueForm};
pub use eviction::EvictionPolicy;
pub use pattern::glob_match;
pub use stats::{CacheStats, StatsReport};
pub use store::CacheStore;

// == Public Constants ==
/// Maximum number of expired keys purged per write-lock acquisition during a sweep
pub const SWEEP_BATCH_SIZE: usize = 256;
