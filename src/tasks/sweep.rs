//! Expiry Sweep Task
//!
//! Background task that periodically purges expired cache entries.
//!
//! Reads already ignore and purge dead entries on their own, so the sweep
//! only reclaims memory held by keys nobody asks for anymore.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheStore, SWEEP_BATCH_SIZE};

/// Runs one sweep pass over `cache`.
///
/// Expired keys are collected under the read lock, then purged in batches of
/// [`SWEEP_BATCH_SIZE`], taking the write lock once per batch. Each key is
/// re-checked before removal since it may have been rewritten in between.
///
/// Returns the number of entries purged.
pub async fn sweep_expired<V>(cache: &RwLock<CacheStore<V>>) -> usize
where
    V: Serialize + DeserializeOwned + Clone,
{
    let candidates = cache.read().await.expired_keys(Instant::now());
    if candidates.is_empty() {
        return 0;
    }

    let mut removed = 0;
    for batch in candidates.chunks(SWEEP_BATCH_SIZE) {
        let mut guard = cache.write().await;
        let now = Instant::now();
        for key in batch {
            if guard.remove_if_expired(key, now) {
                removed += 1;
            }
        }
    }
    removed
}

/// Spawns a background task that sweeps `cache` every `interval` until
/// `cancel` fires. `interval` must be non-zero.
///
/// # Returns
/// A JoinHandle for the spawned task; it completes shortly after cancellation.
pub fn spawn_sweep_task<V>(
    cache: Arc<RwLock<CacheStore<V>>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiry sweep task");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let removed = sweep_expired(&cache).await;
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }

        info!("Expiry sweep task stopped");
    })
}
