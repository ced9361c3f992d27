//! Tendermint / Cosmos SDK LCD collector.
//!
//! Scrapes account balances, validator rank, staking parameters, and
//! governance counts from a Cosmos LCD endpoint. Every call goes through the
//! last-known-good layer so one flaky LCD query freezes a gauge instead of
//! zeroing it.

use async_trait::async_trait;
use prometheus::{Gauge, GaugeVec, Registry};
use serde_json::{json, Value};
use tracing::error;

use crate::config::TargetConfig;
use crate::fetch::{Poller, RequestShape};
use crate::metrics::{encode_text, gauge, gauge_vec};

use super::{as_number, join_metrics, load_exist_metrics, Collector, CollectorError};

pub struct TendermintCollector {
    api_url: String,
    addresses: Vec<String>,
    validators: Vec<String>,
    exist_metrics_url: Option<String>,
    scale: f64,
    poller: Poller,
    registry: Registry,

    balance: GaugeVec,
    available: GaugeVec,
    delegated: GaugeVec,
    unbonding: GaugeVec,
    rewards: GaugeVec,
    commission: GaugeVec,
    rank: GaugeVec,
    max_validators: Gauge,
    proposals: Gauge,
}

impl TendermintCollector {
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
        let delegated = gauge_vec(
            &registry,
            &format!("{prefix}_address_delegated"),
            "Delegated balance of address",
            &["address"],
        )?;
        let unbonding = gauge_vec(
            &registry,
            &format!("{prefix}_address_unbonding"),
            "Unbonding balance of address",
            &["address"],
        )?;
        let rewards = gauge_vec(
            &registry,
            &format!("{prefix}_address_rewards"),
            "Rewards of address",
            &["address"],
        )?;
        let commission = gauge_vec(
            &registry,
            &format!("{prefix}_address_commission"),
            "Commission balance of address",
            &["address"],
        )?;
        let rank = gauge_vec(
            &registry,
            &format!("{prefix}_validator_rank"),
            "Your rank of validators",
            &["validator"],
        )?;
        let max_validators = gauge(
            &registry,
            &format!("{prefix}_staking_parameters_max_validator_count"),
            "Limitation of validators count",
        )?;
        let proposals = gauge(
            &registry,
            &format!("{prefix}_gov_proposals_count"),
            "Gov proposals count",
        )?;

        Ok(Self {
            api_url: target.api_url.trim_end_matches('/').to_string(),
            addresses: target.address_list(),
            validators: target.validator_list(),
            exist_metrics_url: target.exist_metrics_url.clone(),
            scale: 10f64.powi(target.effective_decimals() as i32),
            poller,
            registry,
            balance,
            available,
            delegated,
            unbonding,
            rewards,
            commission,
            rank,
            max_validators,
            proposals,
        })
    }

    /// Fetches one LCD amount, scaled down to whole denomination units.
    async fn amount<F>(&self, url: &str, extract: F) -> Option<f64>
    where
        F: FnOnce(&Value) -> Option<Value>,
    {
        let value = self
            .poller
            .call_with_fallback(url, RequestShape::Get, extract)
            .await;
        as_number(&value).map(|v| v / self.scale)
    }

    async fn update_address_balances(&self, address: &str) {
        let available = self
            .amount(&format!("{}/bank/balances/{address}", self.api_url), |json| {
                sum_by(json.get("result")?.as_array()?, |item| item.get("amount"))
            })
            .await;
        let delegated = self
            .amount(
                &format!("{}/staking/delegators/{address}/delegations", self.api_url),
                |json| {
                    sum_by(json.get("result")?.as_array()?, |item| {
                        item.get("balance")?.get("amount")
                    })
                },
            )
            .await;
        let unbonding = self
            .amount(
                &format!(
                    "{}/staking/delegators/{address}/unbonding_delegations",
                    self.api_url
                ),
                |json| {
                    sum_by(json.get("result")?.as_array()?, |item| {
                        item.get("balance")?.get("amount")
                    })
                },
            )
            .await;
        let rewards = self
            .amount(
                &format!("{}/distribution/delegators/{address}/rewards", self.api_url),
                |json| {
                    sum_by(json.get("result")?.get("total")?.as_array()?, |item| {
                        item.get("amount")
                    })
                },
            )
            .await;

        // The LCD exposes commission per validator, not per delegator
        // address; the configured validator's commission is attributed to
        // the tracked address.
        let commission = match self.validators.first() {
            Some(validator) => {
                self.amount(
                    &format!("{}/distribution/validators/{validator}", self.api_url),
                    |json| {
                        let top = json.get("result")?.get("val_commission")?;
                        match top.get("commission") {
                            Some(Value::Array(items)) => sum_by(items, |i| i.get("amount")),
                            _ => sum_by(top.as_array()?, |i| i.get("amount")),
                        }
                    },
                )
                .await
            }
            None => None,
        };

        let parts = [available, delegated, unbonding, rewards, commission];
        if let Some(v) = available {
            self.available.with_label_values(&[address]).set(v);
        }
        if let Some(v) = delegated {
            self.delegated.with_label_values(&[address]).set(v);
        }
        if let Some(v) = unbonding {
            self.unbonding.with_label_values(&[address]).set(v);
        }
        if let Some(v) = rewards {
            self.rewards.with_label_values(&[address]).set(v);
        }
        if let Some(v) = commission {
            self.commission.with_label_values(&[address]).set(v);
        }

        if parts.iter().any(Option::is_some) {
            let total: f64 = parts.iter().map(|p| p.unwrap_or(0.0)).sum();
            self.balance.with_label_values(&[address]).set(total);
        }
    }

    async fn update_rank(&self, validator: &str) {
        let url = format!(
            "{}/staking/validators?status=bonded&page=1&limit=128",
            self.api_url
        );
        let value = self
            .poller
            .call_with_fallback(&url, RequestShape::Get, |json| {
                let list = json.get("result")?.as_array()?;
                let mut rows = Vec::with_capacity(list.len());
                for item in list {
                    let operator = item.get("operator_address")?.as_str()?;
                    let tokens = as_number(item.get("tokens")?)?;
                    rows.push((operator, tokens));
                }
                rows.sort_by(|a, b| b.1.total_cmp(&a.1));

                // Rank 0 when the validator is not in the bonded set.
                let rank = rows
                    .iter()
                    .position(|(operator, _)| *operator == validator)
                    .map_or(0, |i| i + 1);
                Some(json!(rank))
            })
            .await;

        if let Some(rank) = as_number(&value) {
            self.rank.with_label_values(&[validator]).set(rank);
        }
    }

    async fn update_max_validators(&self) {
        let url = format!("{}/staking/parameters", self.api_url);
        let value = self
            .poller
            .call_with_fallback(&url, RequestShape::Get, |json| {
                json.get("result")?.get("max_validators").cloned()
            })
            .await;

        if let Some(limit) = as_number(&value) {
            self.max_validators.set(limit);
        }
    }

    async fn update_proposals_count(&self) {
        let url = format!("{}/gov/proposals", self.api_url);
        let value = self
            .poller
            .call_with_fallback(&url, RequestShape::Get, |json| {
                Some(json!(json.get("result")?.as_array()?.len()))
            })
            .await;

        if let Some(count) = as_number(&value) {
            self.proposals.set(count);
        }
    }
}

#[async_trait]
impl Collector for TendermintCollector {
    fn chain(&self) -> &'static str {
        "tendermint"
    }

    async fn collect(&self) -> String {
        for address in &self.addresses {
            self.update_address_balances(address).await;
        }
        for validator in &self.validators {
            self.update_rank(validator).await;
        }
        self.update_max_validators().await;
        self.update_proposals_count().await;

        let own = match encode_text(&self.registry) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to encode tendermint registry");
                String::new()
            }
        };
        let exist = load_exist_metrics(&self.poller, self.exist_metrics_url.as_deref()).await;
        join_metrics(own, exist)
    }
}

/// Sums a numeric field over an LCD result array. LCD amounts arrive as
/// decimal strings; a row missing the field fails the whole extraction so a
/// partial sum is never mistaken for a real balance.
fn sum_by<'a, F>(items: &'a [Value], pick: F) -> Option<Value>
where
    F: Fn(&'a Value) -> Option<&'a Value>,
{
    let mut total = 0.0;
    for item in items {
        total += as_number(pick(item)?)?;
    }
    Some(json!(total))
}
