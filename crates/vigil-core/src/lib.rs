//! # Vigil Core
//!
//! Core library for the Vigil blockchain node exporter.
//!
//! This crate provides the foundational components for:
//!
//! - **[`fetch`]**: Single-shot HTTP/JSON-RPC execution with response
//!   extraction, plus the [`fetch::Poller`] that layers the caching policies
//!   on top of it.
//!
//! - **[`cache`]**: The three storage policies behind the poller: a
//!   TTL-stamped map for stale-while-revalidate reads, an LRU-bounded store
//!   for immutable payloads, and a last-known-good fallback store.
//!
//! - **[`collector`]**: Per-chain metric collectors (Tendermint LCD, Solana
//!   JSON-RPC, EVM JSON-RPC) that turn node responses into Prometheus
//!   gauges.
//!
//! - **[`config`]**: Layered configuration with file and environment
//!   sources.
//!
//! - **[`metrics`]**: Prometheus registry helpers and text exposition.
//!
//! ## Scrape Flow
//!
//! ```text
//! GET /metrics
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Collector  │  one per configured chain
//! └──────┬──────┘
//!        │ update gauges
//!        ▼
//! ┌─────────────┐
//! │   Poller    │
//! └──────┬──────┘
//!        │
//!   ┌────┴──────────────┬──────────────────┐
//!   ▼                   ▼                  ▼
//! TimeBoxedCache   ImmutableCache    FallbackStore
//! (serve stale,    (age-blind LRU)   (last good value)
//!  refresh in
//!  background)
//!   │                   │                  │
//!   └────┬──────────────┴──────────────────┘
//!        │ miss
//!        ▼
//! ┌─────────────┐
//! │ HttpClient  │  exactly one request, no retries
//! └─────────────┘
//! ```
//!
//! A scrape never waits on data that is merely stale: expired entries are
//! served as-is while a background task refreshes them, so the node's
//! slowness shows up in metric lag rather than scrape latency.

pub mod cache;
pub mod collector;
pub mod config;
pub mod fetch;
pub mod metrics;
