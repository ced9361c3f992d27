//! Last-known-good store.
//!
//! Remembers the most recent successful value for every request identity it
//! has ever seen. When a live call fails, the previous good value is served
//! so a flaky upstream shows up as frozen metrics instead of gaps. Entries
//! have no TTL and are never evicted; the working set is bounded by the set
//! of distinct requests the collectors make.

use ahash::RandomState;
use dashmap::DashMap;
use serde_json::Value;

pub struct FallbackStore {
    entries: DashMap<String, Value, RandomState>,
}

impl FallbackStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Records the newest successful value for a request identity,
    /// unconditionally replacing the previous one.
    pub fn record(&self, key: &str, value: Value) {
        self.entries.insert(key.to_owned(), value);
    }

    /// The most recent successful value, if any call under this identity has
    /// ever succeeded.
    #[must_use]
    pub fn last_good(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FallbackStore {
    fn default() -> Self {
        Self::new()
    }
}
