//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! the estimated memory footprint.

use serde::Serialize;

use crate::config::CacheConfig;

// == Cache Stats ==
/// Tracks cache performance metrics.
///
/// Hit, miss and eviction counters are cumulative for the lifetime of the
/// cache; a flush only resets the entry count and memory estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries removed by the eviction policy
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Estimated size of all keys and entries in bytes
    pub memory_bytes: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Complement of the hit rate.
    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Update Footprint ==
    /// Updates the entry count and memory estimate.
    pub fn set_footprint(&mut self, total_entries: usize, memory_bytes: usize) {
        self.total_entries = total_entries;
        self.memory_bytes = memory_bytes;
    }
}

// == Stats Report ==
/// Read-only snapshot returned to callers: counters, derived rates and the
/// configuration the cache was built with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub config: CacheConfig,
}

impl StatsReport {
    pub fn new(stats: CacheStats, config: CacheConfig) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            miss_rate: stats.miss_rate(),
            stats,
            config,
        }
    }

    /// True when the memory estimate exceeds the advisory budget.
    pub fn over_memory_budget(&self) -> bool {
        self.stats.memory_bytes as u64 > self.config.max_memory_bytes
    }
}
