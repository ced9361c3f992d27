//! Outbound call plumbing.
//!
//! - **[`client`]**: the shared single-attempt HTTP executor and the request
//!   shape it sends (GET, or JSON POST with automatic JSON-RPC enveloping).
//! - **[`key`]**: deterministic request identity used as the cache key by
//!   every storage layer.
//! - **[`errors`]**: the one error type every failure collapses into.
//! - **[`poller`]**: the front door combining the executor with the caching
//!   layers: stale-while-revalidate, immutable, and last-known-good.

pub mod client;
pub mod errors;
pub mod key;
pub mod poller;

pub use client::{HttpClient, HttpConfig, RequestShape};
pub use errors::FetchError;
pub use key::request_key;
pub use poller::Poller;
