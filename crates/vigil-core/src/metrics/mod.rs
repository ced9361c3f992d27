//! Prometheus gauge plumbing shared by the collectors.
//!
//! Each collector owns its own [`Registry`] so rendering one chain's metrics
//! never drags in another's. Helpers here cover the two shapes the
//! collectors need (plain gauges and labeled gauge families) plus text
//! encoding of a whole registry.

use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors raised while registering or rendering metrics.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MetricsError {
    #[error("metrics registry error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metrics encoding error: {0}")]
    Encoding(String),
}

/// Creates a labeled gauge family and registers it.
pub fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, MetricsError> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Creates an unlabeled gauge and registers it.
pub fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, MetricsError> {
    let gauge = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Renders a registry in the Prometheus text exposition format.
pub fn encode_text(registry: &Registry) -> Result<String, MetricsError> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
}
