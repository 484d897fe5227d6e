//! Cache-aside reads.
//!
//! Check the cache, fall back to the remote source with retry on a miss, and
//! populate the cache with whatever was fetched. Concurrent misses for the
//! same key are not coalesced: each fetches on its own and the last `set` wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::CacheEngine;
use crate::error::FetchError;
use crate::fetch::{retry_with_backoff, timed, FetchMetrics, FetchSample, RetryConfig};

// == Fetch Options ==
/// Per-read settings for [`CacheAside`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// TTL for the populated entry; the cache default when None
    pub ttl: Option<Duration>,
    /// Tags attached to the populated entry
    pub tags: Vec<String>,
    /// Stops retrying once cancelled
    pub cancel: CancellationToken,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn cancel_on(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

// == Cache Aside ==
/// Cache-aside reader combining the cache engine, retry and timing.
pub struct CacheAside<V> {
    cache: CacheEngine<V>,
    retry: RetryConfig,
    metrics: Arc<FetchMetrics>,
}

impl<V> CacheAside<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(cache: CacheEngine<V>, retry: RetryConfig) -> Self {
        Self {
            cache,
            retry,
            metrics: Arc::new(FetchMetrics::new()),
        }
    }

    /// Shares an existing metrics sink instead of creating one.
    pub fn with_metrics(mut self, metrics: Arc<FetchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn cache(&self) -> &CacheEngine<V> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<FetchMetrics> {
        &self.metrics
    }

    // == Get Or Fetch ==
    /// Returns the cached value for `key`, fetching and caching it on a miss.
    pub async fn get_or_fetch<E, F, Fut>(
        &self,
        key: &str,
        options: &FetchOptions,
        fetch: F,
    ) -> Result<V, FetchError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        if let Some(value) = self.cache.get_value(key).await {
            debug!(key = %key, "cache hit");
            self.metrics
                .record(FetchSample::new(key, started.elapsed(), true, true));
            return Ok(value);
        }

        debug!(key = %key, "cache miss, fetching");
        self.fetch_and_populate(key, options, fetch).await
    }

    // == Refresh ==
    /// Fetches `key` from the remote source without consulting the cache,
    /// then caches the result so later reads hit.
    pub async fn refresh<E, F, Fut>(
        &self,
        key: &str,
        options: &FetchOptions,
        fetch: F,
    ) -> Result<V, FetchError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::fmt::Display,
    {
        debug!(key = %key, "refreshing from remote source");
        self.fetch_and_populate(key, options, fetch).await
    }

    async fn fetch_and_populate<E, F, Fut>(
        &self,
        key: &str,
        options: &FetchOptions,
        fetch: F,
    ) -> Result<V, FetchError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::fmt::Display,
    {
        let outcome = timed(retry_with_backoff(&self.retry, &options.cancel, fetch)).await;
        self.metrics.record(FetchSample::new(
            key,
            outcome.elapsed,
            outcome.succeeded,
            false,
        ));
        let value = outcome.into_result()?;

        let tags: Vec<&str> = options.tags.iter().map(String::as_str).collect();
        if let Err(err) = self
            .cache
            .set(key, value.clone(), options.ttl, &tags)
            .await
        {
            warn!(key = %key, error = %err, "could not cache fetched value");
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn aside() -> CacheAside<Vec<u32>> {
        let engine = CacheEngine::new(CacheConfig::default()).unwrap();
        CacheAside::new(engine, RetryConfig::new(3, Duration::from_millis(10)))
    }

    #[tokio::test]
    async fn test_miss_fetches_then_hits() {
        let aside = aside();
        let calls = Arc::new(AtomicU32::new(0));
        let fetch = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(vec![1, 2])
            }
        };

        let first = aside.get_or_fetch("orders:1", &FetchOptions::new(), fetch).await;
        let second = aside.get_or_fetch("orders:1", &FetchOptions::new(), fetch).await;

        assert_eq!(first.unwrap(), vec![1, 2]);
        assert_eq!(second.unwrap(), vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let ratios: Vec<f64> = aside
            .metrics()
            .samples()
            .into_iter()
            .map(|s| s.cache_hit_ratio)
            .collect();
        assert_eq!(ratios, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache_and_repopulates() {
        let aside = aside();
        aside
            .cache()
            .set("orders:1", vec![1], None, &[])
            .await
            .unwrap();

        let refreshed = aside
            .refresh("orders:1", &FetchOptions::new(), || async {
                Ok::<_, String>(vec![9])
            })
            .await
            .unwrap();

        assert_eq!(refreshed, vec![9]);
        assert_eq!(aside.cache().get_value("orders:1").await, Some(vec![9]));
    }

    #[tokio::test]
    async fn test_populated_entry_carries_tags_and_ttl() {
        let aside = aside();
        let options = FetchOptions::new()
            .ttl(Duration::from_secs(30))
            .tag("orders");

        aside
            .get_or_fetch("orders:7", &options, || async { Ok::<_, String>(vec![7]) })
            .await
            .unwrap();

        let ttl = aside.cache().time_to_live("orders:7").await.unwrap();
        assert!(ttl <= Duration::from_secs(30));
        assert_eq!(aside.cache().invalidate_by_tag("orders").await, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let aside = aside();

        let result = aside
            .get_or_fetch("orders:1", &FetchOptions::new(), || async {
                Err::<Vec<u32>, _>("remote down".to_string())
            })
            .await;

        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 3, .. })));
        assert!(!aside.cache().exists("orders:1").await);

        let summary = aside.metrics().summary();
        assert_eq!(summary.samples, 1);
        assert_eq!(summary.failures, 1);
    }
}
