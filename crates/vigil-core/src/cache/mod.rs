//! Caching layers backing the poller.
//!
//! Three stores with deliberately different lifetimes sit between the
//! collectors and the network:
//!
//! ```text
//!                      ┌─────────────────┐
//!   fetch_cached ────▶ │ TimeBoxedCache  │  fresh/stale vs per-call TTL,
//!                      │                 │  stale survives failed refreshes
//!                      └─────────────────┘
//!                      ┌─────────────────┐
//!   fetch_immutable ─▶ │ ImmutableCache  │  age-blind hits,
//!                      │                 │  strict LRU capacity bound
//!                      └─────────────────┘
//!                      ┌─────────────────┐
//!   call_with_fallback │ FallbackStore   │  last success per request
//!                ────▶ │                 │  identity, read only on failure
//!                      └─────────────────┘
//! ```
//!
//! # Cache Types
//!
//! ## `TimeBoxedCache`
//! Timestamped entries judged fresh or stale against a TTL supplied at
//! lookup time. Nothing expires on its own and nothing is evicted; stale
//! entries keep serving until a refresh succeeds. Also home to the jittered
//! TTL helper used to de-synchronize fleets polling the same public API.
//!
//! ## `ImmutableCache`
//! Storage for responses that can never change once they exist (finalized
//! historical records). Hits are served regardless of age; the only pressure
//! is memory, handled by evicting the least-recently-used entry before each
//! insertion that would exceed the capacity bound.
//!
//! ## `FallbackStore`
//! Unbounded last-known-good map for call sites that must always produce a
//! value. Written on every success, read only when a live call fails.

pub mod fallback;
pub mod immutable;
pub mod timebox;

pub use fallback::FallbackStore;
pub use immutable::{default_cacheable, CacheError, ImmutableCache, DEFAULT_IMMUTABLE_MAX_ENTRIES};
pub use timebox::{jittered_ttl, CachedValue, TimeBoxedCache};
