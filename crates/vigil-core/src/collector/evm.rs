//! Collector for EVM-compatible chains.
//!
//! Covers any node speaking the standard Ethereum JSON-RPC surface
//! (`eth_blockNumber`, `eth_getBalance`, `eth_gasPrice`, `eth_syncing`).
//! Quantities arrive as 0x-prefixed hex strings and balances are scaled by
//! the configured decimals, 18 unless overridden.

use std::time::Duration;

use async_trait::async_trait;
use prometheus::{Gauge, GaugeVec, Registry};
use serde_json::{json, Value};
use tracing::error;

use crate::config::TargetConfig;
use crate::fetch::{Poller, RequestShape};
use crate::metrics::{encode_text, gauge, gauge_vec};

use super::{join_metrics, load_exist_metrics, Collector, CollectorError};

const WEI_PER_GWEI: f64 = 1e9;

pub struct EvmCollector {
    rpc_url: String,
    addresses: Vec<String>,
    exist_metrics_url: Option<String>,
    scale: f64,
    poller: Poller,
    registry: Registry,

    balance: GaugeVec,
    available: GaugeVec,
    block_number: Gauge,
    gas_price: Gauge,
    syncing: Gauge,
}

impl EvmCollector {
    pub fn new(target: &TargetConfig, poller: Poller) -> Result<Self, CollectorError> {
        let prefix = target.effective_prefix();
        let registry = Registry::new();

        let balance = gauge_vec(
            &registry,
            &format!("{prefix}_address_balance"),
            "Total balance of address",
            &["address"],
        )?;
        let available = gauge_vec(
            &registry,
            &format!("{prefix}_address_available"),
            "Available balance of address",
            &["address"],
        )?;
        let block_number = gauge(
            &registry,
            &format!("{prefix}_block_number"),
            "Latest block number reported by the node",
        )?;
        let gas_price = gauge(
            &registry,
            &format!("{prefix}_gas_price_gwei"),
            "Current gas price in gwei",
        )?;
        let syncing = gauge(
            &registry,
            &format!("{prefix}_syncing"),
            "1 when the node reports an active sync, 0 otherwise",
        )?;

        Ok(Self {
            rpc_url: target.rpc_url().trim_end_matches('/').to_string(),
            addresses: target.address_list(),
            exist_metrics_url: target.exist_metrics_url.clone(),
            scale: 10f64.powi(target.effective_decimals() as i32),
            poller,
            registry,
            balance,
            available,
            block_number,
            gas_price,
            syncing,
        })
    }

    async fn update_block_number(&self) {
        let value = self
            .poller
            .post_cached(
                &self.rpc_url,
                json!({"method": "eth_blockNumber", "params": []}),
                |json| json.get("result").cloned(),
                Duration::from_secs(10),
            )
            .await;

        if let Some(height) = hex_to_f64(&value) {
            self.block_number.set(height);
        }
    }

    /// Balances survive node restarts through the fallback store, so a
    /// flapping RPC endpoint does not zero out alerting thresholds.
    async fn update_balances(&self) {
        for address in &self.addresses {
            let body = json!({"method": "eth_getBalance", "params": [address, "latest"]});
            let value = self
                .poller
                .call_with_fallback(&self.rpc_url, RequestShape::Post(body), |json| {
                    json.get("result").cloned()
                })
                .await;

            if let Some(wei) = hex_to_f64(&value) {
                let tokens = wei / self.scale;
                self.available.with_label_values(&[address]).set(tokens);
                self.balance.with_label_values(&[address]).set(tokens);
            }
        }
    }

    async fn update_gas_price(&self) {
        let value = self
            .poller
            .post_cached(
                &self.rpc_url,
                json!({"method": "eth_gasPrice", "params": []}),
                |json| json.get("result").cloned(),
                Duration::from_secs(30),
            )
            .await;

        if let Some(wei) = hex_to_f64(&value) {
            self.gas_price.set(wei / WEI_PER_GWEI);
        }
    }

    async fn update_syncing(&self) {
        let value = self
            .poller
            .post_cached(
                &self.rpc_url,
                json!({"method": "eth_syncing", "params": []}),
                |json| json.get("result").cloned(),
                Duration::from_secs(10),
            )
            .await;

        // eth_syncing returns `false` when caught up and a progress object
        // while syncing.
        match &value {
            Value::Bool(false) => self.syncing.set(0.0),
            Value::Object(_) | Value::Bool(true) => self.syncing.set(1.0),
            _ => {}
        }
    }
}

#[async_trait]
impl Collector for EvmCollector {
    fn chain(&self) -> &'static str {
        "evm"
    }

    async fn collect(&self) -> String {
        self.update_block_number().await;
        self.update_balances().await;
        self.update_gas_price().await;
        self.update_syncing().await;

        let own = match encode_text(&self.registry) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to encode evm registry");
                String::new()
            }
        };
        let exist = load_exist_metrics(&self.poller, self.exist_metrics_url.as_deref()).await;
        join_metrics(own, exist)
    }
}

/// Parses an 0x-prefixed hex quantity. Values beyond u128 do not occur for
/// balances or gas prices on real networks.
fn hex_to_f64(value: &Value) -> Option<f64> {
    let text = value.as_str()?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u128::from_str_radix(digits, 16).ok().map(|n| n as f64)
}
