//! Cache Entry Module
//!
//! Defines individual cache entries, their bookkeeping fields and the
//! optional serialized storage form of their values.

use std::collections::HashSet;
use std::mem;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

// == Value Form ==
/// How a value was stored or returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueForm {
    /// Went through the serialize/deserialize transform
    Transformed,
    /// Kept as the caller's value, either because the transform is disabled
    /// or because encoding failed
    Raw,
}

// == Lookup ==
/// Outcome of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// A live entry was found
    Hit { value: V, form: ValueForm },
    /// A live entry was found but its stored bytes could not be decoded;
    /// the bytes are handed back unchanged
    Undecodable(Vec<u8>),
    /// No live entry under this key
    Miss,
}

impl<V> Lookup<V> {
    /// Returns the decoded value, if any.
    pub fn into_value(self) -> Option<V> {
        match self {
            Lookup::Hit { value, .. } => Some(value),
            Lookup::Undecodable(_) | Lookup::Miss => None,
        }
    }

    /// True for every outcome backed by a live entry.
    pub fn is_hit(&self) -> bool {
        !matches!(self, Lookup::Miss)
    }
}

// == Payload ==
/// Stored representation of a cached value.
#[derive(Debug, Clone)]
pub enum Payload<V> {
    Raw(V),
    Encoded(Vec<u8>),
}

impl<V> Payload<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    /// Builds the stored form, encoding to JSON bytes when `transform` is set.
    ///
    /// Encoding is best-effort: a value that cannot be serialized is kept raw.
    pub fn store(value: V, transform: bool) -> Self {
        if !transform {
            return Payload::Raw(value);
        }
        match serde_json::to_vec(&value) {
            Ok(bytes) => Payload::Encoded(bytes),
            Err(err) => {
                warn!(error = %err, "value transform failed, storing raw value");
                Payload::Raw(value)
            }
        }
    }

    /// Form the value was stored in.
    pub fn form(&self) -> ValueForm {
        match self {
            Payload::Raw(_) => ValueForm::Raw,
            Payload::Encoded(_) => ValueForm::Transformed,
        }
    }

    /// Produces the caller-facing value.
    pub fn load(&self) -> Lookup<V> {
        match self {
            Payload::Raw(value) => Lookup::Hit {
                value: value.clone(),
                form: ValueForm::Raw,
            },
            Payload::Encoded(bytes) => match serde_json::from_slice(bytes) {
                Ok(value) => Lookup::Hit {
                    value,
                    form: ValueForm::Transformed,
                },
                Err(err) => {
                    warn!(error = %err, "value decode failed, returning stored bytes");
                    Lookup::Undecodable(bytes.clone())
                }
            },
        }
    }

    /// Approximate heap footprint of the stored value.
    fn size_hint(&self) -> usize {
        match self {
            Payload::Encoded(bytes) => bytes.len(),
            Payload::Raw(value) => serde_json::to_vec(value)
                .map(|bytes| bytes.len())
                .unwrap_or_else(|_| mem::size_of::<V>()),
        }
    }
}

// == Cache Entry ==
/// A single cache entry with its value and bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub payload: Payload<V>,
    /// Start of the live window; reset by an explicit TTL change
    pub created_at: Instant,
    /// Length of the live window measured from `created_at`
    pub ttl: Duration,
    /// Successful reads since insertion
    pub access_count: u64,
    /// Wall-clock time of the last successful read (or insertion)
    pub last_accessed_at: Instant,
    /// Logical clock value of the last access; strictly ordered across entries
    pub last_access_tick: u64,
    /// Logical clock value at insertion, used to break eviction ties
    pub sequence: u64,
    /// Labels for bulk invalidation
    pub tags: HashSet<String>,
    /// Estimated size of key plus entry in bytes
    pub size_bytes: usize,
}

impl<V> CacheEntry<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    // == Constructor ==
    /// Creates a new entry stamped with `now` and the logical clock value `tick`.
    pub fn new(
        key: &str,
        payload: Payload<V>,
        ttl: Duration,
        tags: HashSet<String>,
        tick: u64,
        now: Instant,
    ) -> Self {
        let size_bytes = key.len()
            + payload.size_hint()
            + tags.iter().map(String::len).sum::<usize>()
            + mem::size_of::<Self>();

        Self {
            payload,
            created_at: now,
            ttl,
            access_count: 0,
            last_accessed_at: now,
            last_access_tick: tick,
            sequence: tick,
            tags,
            size_bytes,
        }
    }
}

impl<V> CacheEntry<V> {
    // == Is Expired ==
    /// Staleness test shared by every read path and the sweep.
    ///
    /// An entry is dead once its age strictly exceeds its TTL.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }

    /// Checks staleness against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Remaining live window, or None once nothing positive is left.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.ttl
            .checked_sub(now.saturating_duration_since(self.created_at))
            .filter(|remaining| !remaining.is_zero())
    }

    /// Signed remaining lifetime in nanoseconds; negative once expired.
    pub fn remaining_nanos_at(&self, now: Instant) -> i128 {
        let age = now.saturating_duration_since(self.created_at);
        self.ttl.as_nanos() as i128 - age.as_nanos() as i128
    }

    // == Bookkeeping ==
    /// Records a successful read.
    pub fn touch(&mut self, now: Instant, tick: u64) {
        self.access_count += 1;
        self.last_accessed_at = now;
        self.last_access_tick = tick;
    }

    /// Restarts the live window from `now` with a new TTL.
    pub fn reset_ttl(&mut self, ttl: Duration, now: Instant) {
        self.created_at = now;
        self.ttl = ttl;
    }

    /// True if the entry carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::thread::sleep;

    fn entry(ttl: Duration, now: Instant) -> CacheEntry<String> {
        CacheEntry::new(
            "key",
            Payload::store("value".to_string(), true),
            ttl,
            HashSet::new(),
            1,
            now,
        )
    }

    /// Serializes fine but never deserializes.
    #[derive(Debug, Clone, PartialEq)]
    struct WriteOnly;

    impl Serialize for WriteOnly {
        fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
            serializer.serialize_str("write-only")
        }
    }

    impl<'de> Deserialize<'de> for WriteOnly {
        fn deserialize<D: Deserializer<'de>>(_: D) -> std::result::Result<Self, D::Error> {
            Err(serde::de::Error::custom("write-only values cannot be read back"))
        }
    }

    /// Never serializes.
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Unencodable(u8);

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn test_entry_creation() {
        let now = Instant::now();
        let entry = entry(Duration::from_secs(60), now);

        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.created_at, now);
        assert_eq!(entry.last_accessed_at, now);
        assert_eq!(entry.sequence, 1);
        assert!(entry.size_bytes > "key".len());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = entry(Duration::from_millis(10), now);

        // Age equal to the TTL is still live; strictly greater is dead
        assert!(!entry.is_expired_at(now + Duration::from_millis(10)));
        assert!(entry.is_expired_at(now + Duration::from_millis(11)));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = entry(Duration::from_millis(10), Instant::now());
        assert!(!entry.is_expired());

        sleep(Duration::from_millis(20));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_remaining_ttl() {
        let now = Instant::now();
        let entry = entry(Duration::from_secs(10), now);

        assert_eq!(entry.remaining_at(now), Some(Duration::from_secs(10)));
        assert_eq!(
            entry.remaining_at(now + Duration::from_secs(4)),
            Some(Duration::from_secs(6))
        );
        assert_eq!(entry.remaining_at(now + Duration::from_secs(11)), None);
        assert!(entry.remaining_nanos_at(now + Duration::from_secs(11)) < 0);
    }

    #[test]
    fn test_remaining_ttl_never_zero() {
        let now = Instant::now();
        let entry = entry(Duration::from_secs(10), now);

        // Age equal to the TTL leaves nothing to report
        assert_eq!(entry.remaining_at(now + Duration::from_secs(10)), None);
        assert_eq!(
            entry.remaining_at(now + Duration::from_millis(9_999)),
            Some(Duration::from_millis(1))
        );
    }

    #[test]
    fn test_touch_updates_bookkeeping() {
        let now = Instant::now();
        let mut entry = entry(Duration::from_secs(10), now);
        let later = now + Duration::from_millis(5);

        entry.touch(later, 9);
        entry.touch(later, 10);

        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed_at, later);
        assert_eq!(entry.last_access_tick, 10);
        assert_eq!(entry.sequence, 1);
    }

    #[test]
    fn test_reset_ttl_restarts_window() {
        let now = Instant::now();
        let mut entry = entry(Duration::from_millis(10), now);
        let later = now + Duration::from_millis(50);
        assert!(entry.is_expired_at(later));

        entry.reset_ttl(Duration::from_secs(1), later);

        assert!(!entry.is_expired_at(later));
        assert_eq!(entry.created_at, later);
    }

    #[test]
    fn test_payload_transform_roundtrip() {
        let payload = Payload::store(vec![1u32, 2, 3], true);
        assert_eq!(payload.form(), ValueForm::Transformed);
        assert_eq!(
            payload.load(),
            Lookup::Hit {
                value: vec![1, 2, 3],
                form: ValueForm::Transformed
            }
        );
    }

    #[test]
    fn test_payload_without_transform_is_raw() {
        let payload = Payload::store("plain".to_string(), false);
        assert_eq!(payload.form(), ValueForm::Raw);
        assert_eq!(payload.load().into_value().as_deref(), Some("plain"));
    }

    #[test]
    fn test_payload_encode_failure_falls_back_to_raw() {
        let payload = Payload::store(Unencodable(7), true);
        assert_eq!(payload.form(), ValueForm::Raw);
        assert_eq!(
            payload.load(),
            Lookup::Hit {
                value: Unencodable(7),
                form: ValueForm::Raw
            }
        );
    }

    #[test]
    fn test_payload_decode_failure_returns_bytes() {
        let payload = Payload::store(WriteOnly, true);
        assert_eq!(payload.form(), ValueForm::Transformed);

        let lookup = payload.load();
        assert_eq!(lookup, Lookup::Undecodable(b"\"write-only\"".to_vec()));
        assert!(lookup.is_hit());
        assert!(lookup.into_value().is_none());
    }

    #[test]
    fn test_has_tag() {
        let tags: HashSet<String> = ["orders".to_string()].into_iter().collect();
        let entry = CacheEntry::new(
            "k",
            Payload::store(1u8, false),
            Duration::from_secs(1),
            tags,
            0,
            Instant::now(),
        );
        assert!(entry.has_tag("orders"));
        assert!(!entry.has_tag("profiles"));
    }
}
