//! Storefront Cache - An in-process key/value cache for hot read paths
//!
//! Provides Redis-like functionality with TTL expiration, pluggable eviction,
//! tag-based invalidation and a retrying cache-aside fetch helper.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod keys;
pub mod tasks;

pub use cache::{CacheEngine, EvictionPolicy, Lookup, StatsReport, ValueForm};
pub use config::CacheConfig;
pub use error::{CacheError, FetchError};
pub use fetch::{CacheAside, FetchOptions, RetryConfig};
