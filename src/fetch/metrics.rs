//! Fetch Metrics Module
//!
//! Aggregates timing and cache-hit samples produced by cache-aside reads.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of samples retained; older ones are dropped first.
pub const MAX_FETCH_SAMPLES: usize = 100;

// == Fetch Sample ==
/// One cache-aside read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchSample {
    /// Cache key the read was for
    pub label: String,
    /// Time spent serving the read
    pub elapsed: Duration,
    /// Whether a value was produced
    pub succeeded: bool,
    /// 1.0 when served from cache, 0.0 when fetched remotely
    pub cache_hit_ratio: f64,
    pub recorded_at: DateTime<Utc>,
}

impl FetchSample {
    pub fn new(
        label: impl Into<String>,
        elapsed: Duration,
        succeeded: bool,
        cache_hit: bool,
    ) -> Self {
        Self {
            label: label.into(),
            elapsed,
            succeeded,
            cache_hit_ratio: if cache_hit { 1.0 } else { 0.0 },
            recorded_at: Utc::now(),
        }
    }
}

// == Fetch Summary ==
/// Aggregate over the retained samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchSummary {
    pub samples: usize,
    pub failures: usize,
    pub average_elapsed: Duration,
    pub average_cache_hit_ratio: f64,
}

// == Fetch Metrics ==
/// Bounded, thread-safe sample buffer.
#[derive(Debug)]
pub struct FetchMetrics {
    samples: Mutex<VecDeque<FetchSample>>,
    capacity: usize,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::with_capacity(MAX_FETCH_SAMPLES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Appends a sample, dropping the oldest once full.
    pub fn record(&self, sample: FetchSample) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        if samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Copy of the retained samples, oldest first.
    pub fn samples(&self) -> Vec<FetchSample> {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples.iter().cloned().collect()
    }

    pub fn summary(&self) -> FetchSummary {
        self.summarize(|_| true)
    }

    /// Summary restricted to samples whose label matches `label`.
    pub fn summary_for(&self, label: &str) -> FetchSummary {
        self.summarize(|sample| sample.label == label)
    }

    pub fn clear(&self) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn summarize(&self, keep: impl Fn(&FetchSample) -> bool) -> FetchSummary {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let selected: Vec<&FetchSample> = samples.iter().filter(|s| keep(s)).collect();
        if selected.is_empty() {
            return FetchSummary::default();
        }

        let count = selected.len();
        let total_elapsed: Duration = selected.iter().map(|s| s.elapsed).sum();
        let total_ratio: f64 = selected.iter().map(|s| s.cache_hit_ratio).sum();

        FetchSummary {
            samples: count,
            failures: selected.iter().filter(|s| !s.succeeded).count(),
            average_elapsed: total_elapsed / count as u32,
            average_cache_hit_ratio: total_ratio / count as f64,
        }
    }
}

impl Default for FetchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary() {
        let metrics = FetchMetrics::new();
        assert_eq!(metrics.summary(), FetchSummary::default());
    }

    #[test]
    fn test_summary_averages() {
        let metrics = FetchMetrics::new();
        metrics.record(FetchSample::new("orders:1", Duration::from_millis(10), true, true));
        metrics.record(FetchSample::new("orders:1", Duration::from_millis(30), true, false));
        metrics.record(FetchSample::new("orders:2", Duration::from_millis(50), false, false));

        let summary = metrics.summary();
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.average_elapsed, Duration::from_millis(30));
        assert!((summary.average_cache_hit_ratio - 1.0 / 3.0).abs() < f64::EPSILON);

        let for_key = metrics.summary_for("orders:1");
        assert_eq!(for_key.samples, 2);
        assert_eq!(for_key.average_cache_hit_ratio, 0.5);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let metrics = FetchMetrics::with_capacity(2);
        for label in ["a", "b", "c"] {
            metrics.record(FetchSample::new(label, Duration::ZERO, true, true));
        }

        let labels: Vec<String> = metrics.samples().into_iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!["b", "c"]);
    }

    #[test]
    fn test_clear() {
        let metrics = FetchMetrics::new();
        metrics.record(FetchSample::new("a", Duration::ZERO, true, true));
        metrics.clear();
        assert!(metrics.samples().is_empty());
    }
}
