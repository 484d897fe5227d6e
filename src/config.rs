//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::cache::EvictionPolicy;
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// Fixed at engine construction. All values can be configured via
/// environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheConfig {
    /// Hard cap on the number of live entries
    pub max_entries: usize,
    /// Advisory memory budget, reported through stats only
    pub max_memory_bytes: u64,
    /// TTL applied when a caller omits one
    pub default_ttl: Duration,
    /// Victim selection strategy used when the cache is full
    pub eviction_policy: EvictionPolicy,
    /// Whether values are serialized before storage
    pub value_transform: bool,
    /// Interval between background expiry sweeps
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_MAX_MEMORY_BYTES` - Advisory memory budget (default: 100 MiB)
    /// - `CACHE_DEFAULT_TTL_SECS` - Default TTL in seconds (default: 300)
    /// - `CACHE_EVICTION_POLICY` - `lru`, `lfu` or `ttl` (default: lru)
    /// - `CACHE_VALUE_TRANSFORM` - Serialize values before storage (default: true)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Expiry sweep frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            max_memory_bytes: env_or("CACHE_MAX_MEMORY_BYTES", defaults.max_memory_bytes),
            default_ttl: Duration::from_secs(env_or(
                "CACHE_DEFAULT_TTL_SECS",
                defaults.default_ttl.as_secs(),
            )),
            eviction_policy: env_or("CACHE_EVICTION_POLICY", defaults.eviction_policy),
            value_transform: env_or("CACHE_VALUE_TRANSFORM", defaults.value_transform),
            sweep_interval: Duration::from_secs(env_or(
                "CACHE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
        }
    }

    // == Builders ==
    /// Returns a copy with a different entry cap.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Returns a copy with a different eviction policy.
    pub fn with_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Returns a copy with a different default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Returns a copy with the value transform switched on or off.
    pub fn with_value_transform(mut self, enabled: bool) -> Self {
        self.value_transform = enabled;
        self
    }

    /// Returns a copy with a different sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    // == Validate ==
    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than zero".to_string(),
            ));
        }
        if self.max_memory_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "max_memory_bytes must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_memory_bytes: 100 * 1024 * 1024,
            default_ttl: Duration::from_secs(300),
            eviction_policy: EvictionPolicy::Lru,
            value_transform: true,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Reads and parses an environment variable, falling back to `default` when
/// it is unset or malformed.
pub(crate) fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
