//! Integration Tests for the Vigil Exporter
//!
//! This crate contains various test modules:
//!
//! - `refresh_tests`: Stale-while-revalidate lifecycle across the poller,
//!   including the serve-stale-then-refresh timeline and refresh dedup
//! - `fallback_tests`: Last-known-good behavior when live calls fail
//! - `immutable_tests`: Age-blind caching and LRU capacity enforcement
//! - `identity_tests`: Request identity derivation for cache and fallback keys
//! - `exporter_tests`: Configuration to scrape-page flow for the per-chain
//!   collectors, including pass-through of an existing metrics page
//!
//! ## Running Tests
//!
//! All tests run against local mock HTTP servers, no live node required:
//!
//! ```bash
//! cargo test --package vigil-tests
//! ```


#[cfg(test)]
mod fallback_tests;

#[cfg(test)]
mod immutable_tests;

#[cfg(test)]
mod identity_tests;

#[cfg(test)]
mod exporter_tests;
