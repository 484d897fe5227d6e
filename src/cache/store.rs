//! Cache Store Module
//!
//! Synchronous cache core: the key/entry map, capacity enforcement through
//! the configured eviction policy, TTL expiration and tag invalidation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::{glob_match, CacheEntry, CacheStats, Lookup, Payload, StatsReport, ValueForm};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Main cache storage with pluggable eviction and TTL support.
///
/// Every operation takes `&mut self` or `&self`; sharing across tasks is the
/// job of [`crate::cache::CacheEngine`].
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    /// Fixed at construction
    config: CacheConfig,
    /// Logical clock advanced on every insertion and read
    clock: u64,
    /// Running sum of entry size estimates
    memory_bytes: usize,
}

impl<V> CacheStore<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    // == Constructor ==
    /// Creates a new CacheStore, refusing invalid configurations.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            config,
            clock: 0,
            memory_bytes: 0,
        })
    }

    // == Set ==
    /// Stores a value under `key`, replacing any previous entry and its tags.
    ///
    /// Inserting a new key into a full cache first purges dead entries and,
    /// if that frees nothing, evicts exactly one entry chosen by the policy.
    /// Returns the form the value was stored in.
    pub fn set(
        &mut self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
        tags: &[&str],
    ) -> Result<ValueForm> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        let now = Instant::now();
        if !self.entries.contains_key(key) && self.entries.len() >= self.config.max_entries {
            self.make_room(now);
        }

        let payload = Payload::store(value, self.config.value_transform);
        let form = payload.form();
        let tags: HashSet<String> = tags.iter().map(|t| t.to_string()).collect();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let tick = self.next_tick();

        let entry = CacheEntry::new(key, payload, ttl, tags, tick, now);
        self.memory_bytes += entry.size_bytes;
        if let Some(previous) = self.entries.insert(key.to_string(), entry) {
            self.memory_bytes -= previous.size_bytes;
        }
        self.refresh_footprint();

        Ok(form)
    }

    // == Get ==
    /// Retrieves the value under `key`.
    ///
    /// A dead entry is purged and reported as a miss. A live entry has its
    /// access bookkeeping updated and counts as a hit.
    pub fn get(&mut self, key: &str) -> Lookup<V> {
        let now = Instant::now();
        let tick = self.next_tick();

        match self.live_entry_mut(key, now) {
            Some(entry) => {
                entry.touch(now, tick);
                let lookup = entry.payload.load();
                self.stats.record_hit();
                lookup
            }
            None => {
                self.stats.record_miss();
                Lookup::Miss
            }
        }
    }

    // == Delete ==
    /// Removes an entry, live or dead. Returns true if one existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key).is_some();
        self.refresh_footprint();
        removed
    }

    // == Exists ==
    /// True if a live entry exists; purges a dead one as a side effect.
    pub fn exists(&mut self, key: &str) -> bool {
        self.live_entry_mut(key, Instant::now()).is_some()
    }

    // == Expire ==
    /// Restarts the live window of `key` from now with a new TTL.
    ///
    /// Returns false if the key has no live entry.
    pub fn expire(&mut self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.live_entry_mut(key, now) {
            Some(entry) => {
                entry.reset_ttl(ttl, now);
                true
            }
            None => false,
        }
    }

    // == Time To Live ==
    /// Remaining live window of `key`, or None if it has no live entry.
    pub fn time_to_live(&mut self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.live_entry_mut(key, now)
            .and_then(|entry| entry.remaining_at(now))
    }

    // == Batch Operations ==
    /// Looks up every key, preserving order.
    pub fn multi_get<K: AsRef<str>>(&mut self, keys: &[K]) -> Vec<Lookup<V>> {
        keys.iter().map(|key| self.get(key.as_ref())).collect()
    }

    /// Stores every `(key, value, ttl)` item.
    ///
    /// Keys are validated up front so an empty key rejects the whole batch.
    /// Transform failures only affect their own item.
    pub fn multi_set<I>(&mut self, items: I) -> Result<Vec<ValueForm>>
    where
        I: IntoIterator<Item = (String, V, Option<Duration>)>,
    {
        let items: Vec<_> = items.into_iter().collect();
        if items.iter().any(|(key, _, _)| key.is_empty()) {
            return Err(CacheError::EmptyKey);
        }

        items
            .into_iter()
            .map(|(key, value, ttl)| self.set(&key, value, ttl, &[]))
            .collect()
    }

    // == Key Listing ==
    /// Live keys, optionally filtered by a `*` glob pattern.
    pub fn keys_matching(&self, pattern: Option<&str>) -> BTreeSet<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .filter(|(key, _)| pattern.map_or(true, |p| glob_match(p, key)))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Tag Operations ==
    /// Reads every live entry tagged with `tag`, sorted by key.
    ///
    /// Each entry read counts as a hit and comes back the way [`Self::get`]
    /// would return it, so undecodable entries carry their stored bytes.
    /// Dead tagged entries are purged.
    pub fn entries_by_tag(&mut self, tag: &str) -> Vec<(String, Lookup<V>)> {
        let mut tagged: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.has_tag(tag))
            .map(|(key, _)| key.clone())
            .collect();
        tagged.sort();

        let now = Instant::now();
        let mut found = Vec::with_capacity(tagged.len());
        for key in tagged {
            let tick = self.next_tick();
            let lookup = match self.live_entry_mut(&key, now) {
                Some(entry) => {
                    entry.touch(now, tick);
                    entry.payload.load()
                }
                None => continue,
            };
            self.stats.record_hit();
            found.push((key, lookup));
        }
        found
    }

    /// Removes every entry carrying `tag`, live or dead. Returns the count.
    pub fn invalidate_by_tag(&mut self, tag: &str) -> usize {
        let tagged: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.has_tag(tag))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &tagged {
            self.remove_entry(key);
        }
        self.refresh_footprint();

        debug!(tag = %tag, removed = tagged.len(), "invalidated entries by tag");
        tagged.len()
    }

    // == Flush ==
    /// Removes all entries. Cumulative counters are kept.
    pub fn flush(&mut self) {
        self.entries.clear();
        self.memory_bytes = 0;
        self.refresh_footprint();
    }

    // == Stats ==
    /// Returns current cache statistics with the configuration.
    pub fn stats(&self) -> StatsReport {
        let mut stats = self.stats.clone();
        stats.set_footprint(self.entries.len(), self.memory_bytes);
        StatsReport::new(stats, self.config.clone())
    }

    // == Cleanup Expired ==
    /// Removes all dead entries. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Keys of entries dead at `now`, without removing them.
    pub fn expired_keys(&self, now: Instant) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Removes `key` only if its entry is dead at `now`.
    pub fn remove_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            self.remove_entry(key);
            self.refresh_footprint();
        }
        expired
    }

    // == Accessors ==
    /// Returns the current number of entries, dead ones not yet purged included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Internals ==
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Returns the entry under `key` if live; purges it if dead.
    fn live_entry_mut(&mut self, key: &str, now: Instant) -> Option<&mut CacheEntry<V>> {
        if self.entries.get(key)?.is_expired_at(now) {
            self.remove_entry(key);
            self.refresh_footprint();
            debug!(key = %key, "purged expired entry on access");
            return None;
        }
        self.entries.get_mut(key)
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.memory_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn purge_expired_at(&mut self, now: Instant) -> usize {
        let expired = self.expired_keys(now);
        for key in &expired {
            self.remove_entry(key);
        }
        self.refresh_footprint();
        expired.len()
    }

    /// Frees one slot for a new key.
    fn make_room(&mut self, now: Instant) {
        let purged = self.purge_expired_at(now);
        if self.entries.len() < self.config.max_entries {
            debug!(purged, "made room by purging expired entries");
            return;
        }

        let policy = self.config.eviction_policy;
        let victim = policy
            .select_victim(&self.entries, now)
            .map(str::to_owned);
        if let Some(victim) = victim {
            self.remove_entry(&victim);
            self.stats.record_eviction();
            self.refresh_footprint();
            debug!(key = %victim, policy = %policy, "evicted entry");
        }
    }

    fn refresh_footprint(&mut self) {
        self.stats.set_footprint(self.entries.len(), self.memory_bytes);
    }
}
