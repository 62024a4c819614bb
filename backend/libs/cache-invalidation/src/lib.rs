//! Query Cache Invalidation Library
//!
//! Keeps client-side query caches coherent with server push events.
//!
//! # Architecture
//!
//! ```text
//! Push event (order.status_changed, orderId=42, status=shipped)
//!      ↓
//! Bridge listener:
//!   1. Optimistic patch: ["orders","detail","42"].status = "shipped"
//!      (applied only if the event is not older than the cached value)
//!   2. Invalidate ["orders","detail","42"]   → stale, refetch on next read
//!   3. Invalidate ["orders","list"]          → every list variant goes stale
//!      ↓
//! Refetch completes:
//!   4. set_query_data(key, value, server_time)
//!      (rejected if an optimistic patch with a newer server time is in place)
//! ```
//!
//! Keys are hierarchical; invalidating a key marks every key it prefixes.
//! Invalidation is idempotent: marking an already-stale entry stale again changes nothing.
//!
//! # Example
//!
//! ```
//! use cache_invalidation::{InMemoryQueryCache, QueryCache, QueryKey, PatchOutcome};
//! use chrono::Utc;
//! use serde_json::json;
//!
//! let cache = InMemoryQueryCache::new();
//! let detail = QueryKey::new(["orders", "detail", "42"]);
//!
//! cache.set_query_data(detail.clone(), json!({"id": "42", "status": "pending"}), Utc::now());
//!
//! let outcome = cache.patch(&detail, Utc::now(), &mut |order| {
//!     order["status"] = json!("shipped");
//! });
//! assert_eq!(outcome, PatchOutcome::Applied);
//!
//! assert_eq!(cache.invalidate(&QueryKey::new(["orders"])), 1);
//! assert_eq!(cache.get(&detail).unwrap()["status"], "shipped");
//! ```

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

mod error;
pub mod helpers;
mod stats;

pub use error::InvalidationError;
pub use helpers::{build_cache_key, parse_cache_key};
pub use stats::{InvalidationStats, StatsCollector};

type Result<T> = std::result::Result<T, InvalidationError>;

/// Hierarchical query key, e.g. `["orders", "detail", "42"]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Extend the key by one segment
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Whether `prefix` is this key or one of its ancestors
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build_cache_key(self))
    }
}

/// Result of an optimistic in-place patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// Nothing cached under the key; patches never create entries
    Missing,
    /// Cached value carries a newer server time than the patch
    Superseded,
}

/// Result of an authoritative write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored,
    /// A newer value (usually an optimistic patch) is already cached
    Superseded,
}

/// External contract of a keyed query cache
///
/// Implementations must make `invalidate` idempotent and must never let a
/// patch create an entry that was not cached.
pub trait QueryCache: Send + Sync {
    /// Mark every entry whose key starts with `prefix` stale. Returns entries matched.
    fn invalidate(&self, prefix: &QueryKey) -> usize;

    /// Patch the cached value in place, last-writer-wins by server time `at`
    fn patch(
        &self,
        key: &QueryKey,
        at: DateTime<Utc>,
        patch: &mut dyn FnMut(&mut serde_json::Value),
    ) -> PatchOutcome;

    /// Current cached value, stale or not
    fn get(&self, key: &QueryKey) -> Option<serde_json::Value>;
}

/// One cached query result
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub stale: bool,
    /// Server time of the last accepted write or patch
    pub updated_at: DateTime<Utc>,
    /// Last accepted change was an optimistic patch
    pub optimistic: bool,
}

/// In-process query cache
#[derive(Clone, Default)]
pub struct InMemoryQueryCache {
    entries: Arc<RwLock<HashMap<QueryKey, CacheEntry>>>,
    stats: StatsCollector,
}

impl InMemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an authoritative (fetched) value
    ///
    /// Rejected when the cached entry already reflects a newer server time.
    /// A rejected write leaves the entry stale so the next read refetches.
    pub fn set_query_data(
        &self,
        key: QueryKey,
        value: serde_json::Value,
        server_time: DateTime<Utc>,
    ) -> WriteOutcome {
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(&key) {
            if existing.updated_at > server_time {
                debug!(
                    key = %key,
                    cached_at = %existing.updated_at,
                    write_at = %server_time,
                    "Discarding out-of-order query result"
                );
                self.stats.record_write_superseded();
                return WriteOutcome::Superseded;
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                stale: false,
                updated_at: server_time,
                optimistic: false,
            },
        );
        WriteOutcome::Stored
    }

    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.entries.read().get(key).map(|entry| entry.stale)
    }

    /// Keys currently stale, i.e. awaiting refetch
    pub fn stale_keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn remove(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> InvalidationStats {
        self.stats.snapshot()
    }
}

impl QueryCache for InMemoryQueryCache {
    fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.write();
        let mut touched = 0;

        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.stale = true;
                touched += 1;
            }
        }

        self.stats.record_invalidation(touched);
        debug!(prefix = %prefix, touched, "Invalidated queries");
        touched
    }

    fn patch(
        &self,
        key: &QueryKey,
        at: DateTime<Utc>,
        patch: &mut dyn FnMut(&mut serde_json::Value),
    ) -> PatchOutcome {
        let mut entries = self.entries.write();

        let Some(entry) = entries.get_mut(key) else {
            return PatchOutcome::Missing;
        };

        if entry.updated_at > at {
            debug!(
                key = %key,
                cached_at = %entry.updated_at,
                patch_at = %at,
                "Skipping optimistic patch older than cached value"
            );
            self.stats.record_patch_superseded();
            return PatchOutcome::Superseded;
        }

        patch(&mut entry.value);
        entry.updated_at = at;
        entry.optimistic = true;
        self.stats.record_patch_applied();
        PatchOutcome::Applied
    }

    fn get(&self, key: &QueryKey) -> Option<serde_json::Value> {
        self.entries.read().get(key).map(|entry| entry.value.clone())
    }
}
