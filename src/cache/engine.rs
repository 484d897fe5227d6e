//! Cache Engine Module
//!
//! Shared, cloneable handle over a [`CacheStore`] guarded by an async
//! `RwLock`, plus the lifecycle of the background expiry sweep.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{CacheStore, Lookup, StatsReport, ValueForm};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::{spawn_sweep_task, sweep_expired};

/// Running sweep task and the token that stops it.
struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

// == Cache Engine ==
/// Thread-safe cache shared by every consumer in the process.
///
/// Construct once with [`CacheEngine::new`] (or [`CacheEngine::start`] to
/// also launch the sweep) and hand clones to callers. Call
/// [`CacheEngine::shutdown`] during teardown.
pub struct CacheEngine<V> {
    store: Arc<RwLock<CacheStore<V>>>,
    sweeper: Arc<Mutex<Option<Sweeper>>>,
    shut_down: Arc<AtomicBool>,
}

impl<V> Clone for CacheEngine<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sweeper: Arc::clone(&self.sweeper),
            shut_down: Arc::clone(&self.shut_down),
        }
    }
}

impl<V> CacheEngine<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates an engine without a background sweep.
    ///
    /// Fails if the configuration is invalid.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let store = CacheStore::new(config)?;
        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            sweeper: Arc::new(Mutex::new(None)),
            shut_down: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Creates an engine and starts its sweep. Must run inside a tokio runtime.
    pub async fn start(config: CacheConfig) -> Result<Self> {
        let engine = Self::new(config)?;
        engine.start_sweeper().await;
        Ok(engine)
    }

    // == Sweep Lifecycle ==
    /// Spawns the periodic expiry sweep at the configured interval.
    ///
    /// Returns false if a sweep is already running or the engine was shut down.
    pub async fn start_sweeper(&self) -> bool {
        let interval = self.store.read().await.config().sweep_interval;
        self.start_sweeper_every(interval)
    }

    /// Spawns the periodic expiry sweep with an explicit interval.
    ///
    /// Returns false for a zero interval, if a sweep is already running or
    /// if the engine was shut down.
    pub fn start_sweeper_every(&self, interval: Duration) -> bool {
        if interval.is_zero() {
            warn!("refusing to start expiry sweep with a zero interval");
            return false;
        }
        // Checked under the slot lock so a concurrent shutdown cannot miss it
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() || self.shut_down.load(Ordering::SeqCst) {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = spawn_sweep_task(Arc::clone(&self.store), interval, cancel.clone());
        *slot = Some(Sweeper { cancel, handle });
        true
    }

    /// True while a sweep task is active.
    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Runs one sweep pass now. Returns the number of entries purged.
    pub async fn sweep(&self) -> usize {
        sweep_expired(&self.store).await
    }

    /// Stops the sweep and flushes all entries. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Sweeper { cancel, handle }) = sweeper {
            cancel.cancel();
            if let Err(err) = handle.await {
                warn!(error = %err, "sweep task ended abnormally");
            }
        }

        self.store.write().await.flush();
        info!("Cache engine shut down");
    }

    /// True once [`CacheEngine::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    // == Cache Operations ==
    /// See [`CacheStore::set`].
    pub async fn set(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        tags: &[&str],
    ) -> Result<ValueForm> {
        self.store.write().await.set(key, value, ttl, tags)
    }

    /// See [`CacheStore::get`].
    pub async fn get(&self, key: &str) -> Lookup<V> {
        self.store.write().await.get(key)
    }

    /// Convenience over [`CacheEngine::get`] returning only a decoded value.
    pub async fn get_value(&self, key: &str) -> Option<V> {
        self.get(key).await.into_value()
    }

    /// See [`CacheStore::delete`].
    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    /// See [`CacheStore::exists`]. Takes the write lock to purge a dead entry.
    pub async fn exists(&self, key: &str) -> bool {
        self.store.write().await.exists(key)
    }

    /// See [`CacheStore::expire`].
    pub async fn expire(&self, key: &str, ttl: Duration) -> bool {
        self.store.write().await.expire(key, ttl)
    }

    /// See [`CacheStore::time_to_live`].
    pub async fn time_to_live(&self, key: &str) -> Option<Duration> {
        self.store.write().await.time_to_live(key)
    }

    // == Batch Operations ==
    /// See [`CacheStore::multi_get`]. All keys are read under one lock.
    pub async fn multi_get<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Lookup<V>> {
        self.store.write().await.multi_get(keys)
    }

    /// See [`CacheStore::multi_set`].
    pub async fn multi_set<I>(&self, items: I) -> Result<Vec<ValueForm>>
    where
        I: IntoIterator<Item = (String, V, Option<Duration>)>,
    {
        self.store.write().await.multi_set(items)
    }

    // == Keys and Tags ==
    /// See [`CacheStore::keys_matching`]. Only needs the read lock.
    pub async fn keys_matching(&self, pattern: Option<&str>) -> BTreeSet<String> {
        self.store.read().await.keys_matching(pattern)
    }

    /// See [`CacheStore::entries_by_tag`].
    pub async fn entries_by_tag(&self, tag: &str) -> Vec<(String, Lookup<V>)> {
        self.store.write().await.entries_by_tag(tag)
    }

    /// See [`CacheStore::invalidate_by_tag`].
    pub async fn invalidate_by_tag(&self, tag: &str) -> usize {
        self.store.write().await.invalidate_by_tag(tag)
    }

    // == Flush and Stats ==
    /// Removes all entries. Cumulative counters are kept.
    pub async fn flush(&self) {
        self.store.write().await.flush()
    }

    /// Snapshot of the counters, derived rates and configuration.
    pub async fn stats(&self) -> StatsReport {
        self.store.read().await.stats()
    }

    /// Number of entries held, dead ones not yet purged included.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}
