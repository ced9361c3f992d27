//! Per-chain metric collectors.
//!
//! A collector owns the Prometheus registry for one chain family plus the
//! [`Poller`] it uses to reach the chain. One `collect` pass runs every
//! update the collector knows, renders the registry as text, and appends
//! the pass-through metrics page when one is configured.
//!
//! Update failures never escape a pass: a value that cannot be refreshed is
//! served from a cache layer or simply skipped for the cycle, and the scrape
//! still returns whatever could be produced.

pub mod evm;
pub mod solana;
pub mod tendermint;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::cache::CacheError;
use crate::config::{AppConfig, ChainKind};
use crate::fetch::{FetchError, HttpClient, Poller, RequestShape};
use crate::metrics::MetricsError;

pub use evm::EvmCollector;
pub use solana::SolanaCollector;
pub use tendermint::TendermintCollector;

/// Errors raised while constructing a collector.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CollectorError {
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// A chain-specific metric producer.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Chain family name, used in logs.
    fn chain(&self) -> &'static str;

    /// Runs one full refresh pass and renders the metrics page body.
    async fn collect(&self) -> String;
}

/// Builds the collector selected by `[target].chain`.
pub fn load(config: &AppConfig) -> Result<Arc<dyn Collector>, CollectorError> {
    let client = Arc::new(HttpClient::new(&config.http)?);
    let poller = Poller::new(client, config.cache.immutable_max_entries)?;

    let collector: Arc<dyn Collector> = match config.target.chain {
        ChainKind::Tendermint => Arc::new(TendermintCollector::new(&config.target, poller)?),
        ChainKind::Solana => Arc::new(SolanaCollector::new(&config.target, poller)?),
        ChainKind::Evm => Arc::new(EvmCollector::new(&config.target, poller)?),
    };

    info!(
        chain = collector.chain(),
        api_url = %config.target.api_url,
        "collector loaded"
    );
    Ok(collector)
}

/// Reads a numeric value that upstream APIs serve either as a JSON number or
/// as a decimal string.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Fetches the pre-existing metrics page that gets appended verbatim after
/// our own. Served from the last known good copy when the live fetch fails,
/// and empty when nothing has ever been fetched.
pub(crate) async fn load_exist_metrics(poller: &Poller, url: Option<&str>) -> Option<String> {
    let url = url.filter(|u| !u.is_empty())?;
    let value = poller
        .call_with_fallback(url, RequestShape::Get, |payload| Some(payload.clone()))
        .await;

    Some(match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Joins our rendered registry with the pass-through page, newline-separated,
/// matching the layout scrapers already consume.
pub(crate) fn join_metrics(own: String, exist: Option<String>) -> String {
    match exist {
        Some(exist) => format!("{own}\n{exist}"),
        None => own,
    }
}
