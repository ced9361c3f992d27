//! Time-boxed cache.
//!
//! Entries remember when they were computed and are judged fresh or stale
//! against a TTL the caller supplies at lookup time. Nothing is ever evicted:
//! an entry is only replaced when a newer successful value lands, so a stale
//! value stays servable for as long as the upstream keeps failing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ahash::RandomState;
use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;

/// A cached value together with the instant it was computed.
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub value: Value,
    pub computed_at: Instant,
}

impl CachedValue {
    /// True once the entry's age reaches `ttl`. An entry aged exactly `ttl`
    /// counts as expired.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.computed_at.elapsed() >= ttl
    }
}

/// Concurrent map of request identities to timestamped values.
pub struct TimeBoxedCache {
    entries: DashMap<String, CachedValue, RandomState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TimeBoxedCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up an entry. Freshness is left to the caller since the TTL is a
    /// property of the call site, not of the entry.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores `value` under `key`, stamped with the current instant. An
    /// existing entry is overwritten whatever its age.
    pub fn put(&self, key: &str, value: Value) {
        self.entries.insert(
            key.to_owned(),
            CachedValue {
                value,
                computed_at: Instant::now(),
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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

impl Default for TimeBoxedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws a TTL uniformly from `[base - variance/2, max(base/2, base + variance/2)]`.
///
/// Spreading TTLs out keeps a fleet of exporters polling the same public API
/// from expiring their entries in lockstep.
#[must_use]
pub fn jittered_ttl(base: Duration, variance: Duration) -> Duration {
    let base_ms = millis(base);
    let half_variance_ms = millis(variance) / 2;

    let lower = base_ms.saturating_sub(half_variance_ms);
    let upper = (base_ms / 2).max(base_ms.saturating_add(half_variance_ms));
    if upper <= lower {
        return Duration::from_millis(lower);
    }

    Duration::from_millis(rand::thread_rng().gen_range(lower..=upper))
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
