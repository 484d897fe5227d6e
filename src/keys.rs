//! Key construction and tag vocabulary for callers of the cache.
//!
//! Keys encode the scope of the cached data. Filter parameters are
//! canonicalized so that equal filters always map to the same key, whatever
//! order their fields were written in.

use std::fmt::Display;

use serde::Serialize;

/// Invalidation scopes shared by cache callers.
pub mod tags {
    pub const ORDERS: &str = "orders";
    pub const PROFILES: &str = "profiles";
    pub const ADMIN: &str = "admin";
    pub const STATS: &str = "stats";
}

/// Key for data owned by `owner` within `scope`, e.g. `orders:42`.
pub fn owner_key(scope: &str, owner: impl Display) -> String {
    format!("{scope}:{owner}")
}

/// Key for a filtered listing, e.g. `orders:42:{"status":"paid"}`.
///
/// Filters are serialized through `serde_json::Value`, whose objects keep
/// their fields sorted, so field order never changes the key.
pub fn scoped_key<F>(scope: &str, owner: impl Display, filters: &F) -> serde_json::Result<String>
where
    F: Serialize + ?Sized,
{
    let canonical = serde_json::to_value(filters)?;
    Ok(format!("{}:{canonical}", owner_key(scope, owner)))
}
