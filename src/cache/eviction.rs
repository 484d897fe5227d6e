//! Eviction Policy Module
//!
//! Selects a single victim when the cache is full and a new key arrives.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;

// == Eviction Policy ==
/// Strategy used to pick the entry removed to make room for a new key.
///
/// Every policy scans all candidates. Ties on the policy's measure go to the
/// entry inserted first, so victim selection is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used: oldest last access
    Lru,
    /// Least frequently used: fewest successful reads
    Lfu,
    /// Soonest to expire: smallest remaining lifetime
    Ttl,
}

impl EvictionPolicy {
    // == Select Victim ==
    /// Returns the key to evict among `candidates`, or None if there are none.
    pub fn select_victim<'a, V: 'a, I>(&self, candidates: I, now: Instant) -> Option<&'a str>
    where
        I: IntoIterator<Item = (&'a String, &'a CacheEntry<V>)>,
    {
        let candidates = candidates.into_iter();
        let victim = match self {
            EvictionPolicy::Lru => {
                candidates.min_by_key(|(_, entry)| (entry.last_access_tick, entry.sequence))
            }
            EvictionPolicy::Lfu => {
                candidates.min_by_key(|(_, entry)| (entry.access_count, entry.sequence))
            }
            EvictionPolicy::Ttl => candidates
                .min_by_key(|(_, entry)| (entry.remaining_nanos_at(now), entry.sequence)),
        };
        victim.map(|(key, _)| key.as_str())
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Ttl => "ttl",
        };
        f.write_str(name)
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "ttl" => Ok(EvictionPolicy::Ttl),
            other => Err(format!("unknown eviction policy: {other}")),
        }
    }
}
