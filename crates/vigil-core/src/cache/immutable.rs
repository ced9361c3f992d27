//! Bounded cache for values that never change once they exist.
//!
//! Finalized historical records (a block at a given slot, say) are immutable:
//! age never invalidates them, so a hit is served no matter how old it is.
//! The only pressure on this cache is memory, handled by strict LRU eviction
//! against a capacity bound.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::trace;

/// Capacity bound applied when a call site does not supply its own.
pub const DEFAULT_IMMUTABLE_MAX_ENTRIES: usize = 5_000;

/// Errors raised while constructing a cache.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// LRU-bounded store of immutable responses.
#[derive(Debug)]
pub struct ImmutableCache {
    entries: RwLock<LruCache<String, Value>>,
    default_max_entries: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImmutableCache {
    /// Creates a cache whose insertions are bounded by `max_entries` unless a
    /// call site overrides the bound.
    pub fn new(max_entries: usize) -> Result<Self, CacheError> {
        let default_max_entries = NonZeroUsize::new(max_entries).ok_or_else(|| {
            CacheError::InvalidConfig("max_entries must be greater than zero".to_string())
        })?;

        Ok(Self {
            entries: RwLock::new(LruCache::unbounded()),
            default_max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Looks up `key`, marking the entry most-recently-used on a hit.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts under the cache-wide default bound.
    pub async fn put(&self, key: String, value: Value) {
        self.put_within(key, value, self.default_max_entries.get()).await;
    }

    /// Inserts `key`, evicting least-recently-used entries first so the
    /// insertion lands within `max_entries`. Values here are immutable, so an
    /// existing entry is left untouched.
    pub async fn put_within(&self, key: String, value: Value, max_entries: usize) {
        let bound = max_entries.max(1);
        let mut entries = self.entries.write().await;

        if entries.contains(&key) {
            return;
        }

        while entries.len() >= bound {
            if let Some((evicted, _)) = entries.pop_lru() {
                trace!(key = %evicted, "evicted least-recently-used entry");
            } else {
                break;
            }
        }
        entries.put(key, value);
    }

    /// The bound used by [`ImmutableCache::put`].
    #[must_use]
    pub fn default_max_entries(&self) -> usize {
        self.default_max_entries.get()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Default gate deciding whether a fetched value may enter the cache.
///
/// Nulls and non-finite numbers usually mean "not available yet" rather than
/// a real immutable record, so they are served to the caller but never
/// retained.
#[must_use]
pub fn default_cacheable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(f64::is_finite),
        _ => true,
    }
}
