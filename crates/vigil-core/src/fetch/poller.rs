//! Stale-while-revalidate orchestration.
//!
//! [`Poller`] is the single front door collectors use to talk to the network.
//! It routes every call through one of three disciplines:
//!
//! - `fetch_cached`: serve fresh values from cache; serve stale values
//!   immediately while a detached task refreshes them; fill misses
//!   synchronously. Never returns an error: a miss that cannot be filled
//!   yields a neutral null.
//! - `fetch_immutable`: age-blind cache for responses that never change,
//!   bounded by LRU eviction. Failures propagate since there is no older
//!   value worth serving.
//! - `call_with_fallback`: always calls, remembers every success, and serves
//!   the last known good value when the live call fails.

use std::sync::Arc;
use std::time::Duration;

use ahash::RandomState;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::cache::{
    default_cacheable, CacheError, FallbackStore, ImmutableCache, TimeBoxedCache,
};

use super::client::{HttpClient, RequestShape};
use super::errors::FetchError;
use super::key::request_key;

pub struct Poller {
    client: Arc<HttpClient>,
    timebox: Arc<TimeBoxedCache>,
    immutable: Arc<ImmutableCache>,
    fallback: FallbackStore,
    refreshing: Arc<DashMap<String, (), RandomState>>,
}

impl Poller {
    pub fn new(client: Arc<HttpClient>, immutable_max_entries: usize) -> Result<Self, CacheError> {
        Ok(Self {
            client,
            timebox: Arc::new(TimeBoxedCache::new()),
            immutable: Arc::new(ImmutableCache::new(immutable_max_entries)?),
            fallback: FallbackStore::new(),
            refreshing: Arc::new(DashMap::with_hasher(RandomState::new())),
        })
    }

    /// GET through the stale-while-revalidate cache.
    pub async fn get_cached<F>(&self, url: &str, extract: F, ttl: Duration) -> Value
    where
        F: FnOnce(&Value) -> Option<Value> + Send + 'static,
    {
        self.fetch_cached(url, RequestShape::Get, extract, ttl).await
    }

    /// POST through the stale-while-revalidate cache.
    pub async fn post_cached<F>(&self, url: &str, body: Value, extract: F, ttl: Duration) -> Value
    where
        F: FnOnce(&Value) -> Option<Value> + Send + 'static,
    {
        self.fetch_cached(url, RequestShape::Post(body), extract, ttl)
            .await
    }

    /// Stale-while-revalidate fetch with the client default timeout.
    pub async fn fetch_cached<F>(
        &self,
        url: &str,
        shape: RequestShape,
        extract: F,
        ttl: Duration,
    ) -> Value
    where
        F: FnOnce(&Value) -> Option<Value> + Send + 'static,
    {
        self.fetch_cached_with_timeout(url, shape, extract, ttl, None)
            .await
    }

    /// Stale-while-revalidate fetch.
    ///
    /// A fresh hit is returned without touching the network. A stale hit is
    /// returned immediately and a background refresh is scheduled; the stale
    /// value keeps serving until some refresh succeeds. A miss is filled
    /// synchronously, or answered with `Value::Null` if the call fails, in
    /// which case nothing is cached and the next caller tries again.
    pub async fn fetch_cached_with_timeout<F>(
        &self,
        url: &str,
        shape: RequestShape,
        extract: F,
        ttl: Duration,
        timeout: Option<Duration>,
    ) -> Value
    where
        F: FnOnce(&Value) -> Option<Value> + Send + 'static,
    {
        let key = request_key(url, &shape);

        if let Some(entry) = self.timebox.get(&key) {
            if !entry.is_expired(ttl) {
                trace!(key = %key, "fresh cache hit");
                return entry.value;
            }
            trace!(key = %key, "stale cache hit, scheduling background refresh");
            self.spawn_refresh(key, url.to_owned(), shape, extract, timeout);
            return entry.value;
        }

        debug!(key = %key, "cache miss, fetching synchronously");
        match self.client.execute(url, &shape, extract, timeout).await {
            Ok(value) => {
                self.timebox.put(&key, value.clone());
                value
            }
            Err(error) => {
                warn!(url = url, error = %error, "fetch failed with nothing cached");
                Value::Null
            }
        }
    }

    /// Schedules a detached refresh for `key` unless one is already running.
    /// The task's outcome is never awaited: success overwrites the entry,
    /// failure leaves the stale entry in place.
    fn spawn_refresh<F>(
        &self,
        key: String,
        url: String,
        shape: RequestShape,
        extract: F,
        timeout: Option<Duration>,
    ) where
        F: FnOnce(&Value) -> Option<Value> + Send + 'static,
    {
        use dashmap::mapref::entry::Entry;

        match self.refreshing.entry(key.clone()) {
            Entry::Occupied(_) => {
                trace!(key = %key, "refresh already in flight");
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let client = Arc::clone(&self.client);
        let timebox = Arc::clone(&self.timebox);
        let refreshing = Arc::clone(&self.refreshing);

        tokio::spawn(async move {
            match client.execute(&url, &shape, extract, timeout).await {
                Ok(value) => {
                    timebox.put(&key, value);
                    trace!(key = %key, "background refresh landed");
                }
                Err(error) => {
                    warn!(url = %url, error = %error, "background refresh failed, keeping stale value");
                }
            }
            refreshing.remove(&key);
        });
    }

    /// Fetch through the immutable cache under its default capacity bound
    /// and cacheability gate.
    pub async fn fetch_immutable<F>(
        &self,
        url: &str,
        shape: RequestShape,
        extract: F,
    ) -> Result<Value, FetchError>
    where
        F: FnOnce(&Value) -> Option<Value>,
    {
        let bound = self.immutable.default_max_entries();
        self.fetch_immutable_with(url, shape, extract, bound, default_cacheable)
            .await
    }

    /// Fetch through the immutable cache.
    ///
    /// A hit is served no matter how old. A miss calls the network
    /// synchronously and propagates failure; a success is retained only if
    /// `is_cacheable` accepts it, though it is returned to the caller either
    /// way.
    pub async fn fetch_immutable_with<F, C>(
        &self,
        url: &str,
        shape: RequestShape,
        extract: F,
        max_entries: usize,
        is_cacheable: C,
    ) -> Result<Value, FetchError>
    where
        F: FnOnce(&Value) -> Option<Value>,
        C: Fn(&Value) -> bool,
    {
        let key = request_key(url, &shape);

        if let Some(value) = self.immutable.get(&key).await {
            trace!(key = %key, "immutable cache hit");
            return Ok(value);
        }

        let value = self.client.execute(url, &shape, extract, None).await?;
        if is_cacheable(&value) {
            self.immutable.put_within(key, value.clone(), max_entries).await;
        } else {
            trace!(key = %key, "value not cacheable, serving without retaining");
        }
        Ok(value)
    }

    /// Calls the network every time, remembering successes per request
    /// identity. On failure the last recorded success is served; if nothing
    /// has ever succeeded the neutral null is returned. Never errors.
    pub async fn call_with_fallback<F>(&self, url: &str, shape: RequestShape, extract: F) -> Value
    where
        F: FnOnce(&Value) -> Option<Value>,
    {
        let key = request_key(url, &shape);

        match self.client.execute(url, &shape, extract, None).await {
            Ok(value) => {
                self.fallback.record(&key, value.clone());
                value
            }
            Err(error) => {
                warn!(url = url, error = %error, "call failed, serving last known good value");
                self.fallback.last_good(&key).unwrap_or(Value::Null)
            }
        }
    }

    #[must_use]
    pub fn timebox(&self) -> &TimeBoxedCache {
        &self.timebox
    }

    #[must_use]
    pub fn immutable(&self) -> &ImmutableCache {
        &self.immutable
    }

    #[must_use]
    pub fn fallback(&self) -> &FallbackStore {
        &self.fallback
    }
}
