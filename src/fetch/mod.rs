//! Resilient Fetch Module
//!
//! Helpers for reading from an unreliable remote source: timing, retry with
//! exponential backoff, sample aggregation and the cache-aside composition.

mod aside;
mod metrics;
mod retry;
mod timing;

pub use aside::{CacheAside, FetchOptions};
pub use metrics::{FetchMetrics, FetchSample, FetchSummary, MAX_FETCH_SAMPLES};
pub use retry::{retry_with_backoff, RetryConfig};
pub use timing::{timed, Timed};
