//! Solana JSON-RPC collector.
//!
//! Tracks vote account health, balances, epoch progress, network throughput,
//! leader slots, and stake delegations. TTLs are matched to how fast each
//! source actually moves: epoch info every few seconds, vote accounts once a
//! minute, performance samples every two minutes. Finalized blocks are
//! immutable and go through the LRU-bounded block cache instead.

use std::time::Duration;

use async_trait::async_trait;
use prometheus::{Gauge, GaugeVec, Registry};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::cache::jittered_ttl;
use crate::config::TargetConfig;
use crate::fetch::{Poller, RequestShape};
use crate::metrics::{encode_text, gauge, gauge_vec};

use super::{as_number, join_metrics, load_exist_metrics, Collector, CollectorError};

/// Stake delegation breakdowns come from JPool's public API.
const DELEGATION_API: &str = "https://api.jpool.one";

pub struct SolanaCollector {
    api_url: String,
    rpc_url: String,
    delegation_api: String,
    votes: Vec<String>,
    identities: Vec<String>,
    balance_addresses: Vec<String>,
    exist_metrics_url: Option<String>,
    scale: f64,
    poller: Poller,
    registry: Registry,

    balance: GaugeVec,
    available: GaugeVec,
    activated_stake: GaugeVec,
    active: GaugeVec,
    commission: GaugeVec,
    last_vote: GaugeVec,
    rank: GaugeVec,
    epoch: Gauge,
    slot_index: Gauge,
    slots_in_epoch: Gauge,
    network_tps: Gauge,
    leader_slots: GaugeVec,
    leader_fees: GaugeVec,
    delegations: GaugeVec,
}

struct EpochSnapshot {
    absolute_slot: u64,
    slot_index: u64,
}

impl SolanaCollector {
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
        let activated_stake = gauge_vec(
            &registry,
            &format!("{prefix}_validator_activated_stake"),
            "Your activated stake",
            &["vote"],
        )?;
        let active = gauge_vec(
            &registry,
            &format!("{prefix}_validator_active"),
            "Your validator active",
            &["vote"],
        )?;
        let commission = gauge_vec(
            &registry,
            &format!("{prefix}_validator_commission"),
            "Your validator commission",
            &["vote"],
        )?;
        let last_vote = gauge_vec(
            &registry,
            &format!("{prefix}_validator_last_vote"),
            "Your validator last vote",
            &["vote"],
        )?;
        let rank = gauge_vec(
            &registry,
            &format!("{prefix}_validator_rank"),
            "Your validator rank by activated stake",
            &["vote"],
        )?;
        let epoch = gauge(&registry, &format!("{prefix}_epoch"), "Current epoch")?;
        let slot_index = gauge(
            &registry,
            &format!("{prefix}_slot_index"),
            "Slot index within the current epoch",
        )?;
        let slots_in_epoch = gauge(
            &registry,
            &format!("{prefix}_slots_in_epoch"),
            "Total slots in the current epoch",
        )?;
        let network_tps = gauge(
            &registry,
            &format!("{prefix}_network_tps"),
            "Cluster transactions per second over recent samples",
        )?;
        let leader_slots = gauge_vec(
            &registry,
            &format!("{prefix}_leader_slots_assigned"),
            "Leader slots assigned to the identity in the current epoch",
            &["identity"],
        )?;
        let leader_fees = gauge_vec(
            &registry,
            &format!("{prefix}_leader_slot_fees_sol"),
            "Fee rewards earned over the latest completed 4-slot leader window",
            &["identity", "slot"],
        )?;
        let delegations = gauge_vec(
            &registry,
            &format!("{prefix}_delegation_sol"),
            "Delegations to validator by source",
            &["vote", "source"],
        )?;

        let votes = target.validator_list();
        let identities = target.identity_list();
        let mut balance_addresses = votes.clone();
        for identity in &identities {
            if !balance_addresses.contains(identity) {
                balance_addresses.push(identity.clone());
            }
        }

        Ok(Self {
            api_url: target.api_url.trim_end_matches('/').to_string(),
            rpc_url: target.rpc_url().trim_end_matches('/').to_string(),
            delegation_api: DELEGATION_API.to_string(),
            votes,
            identities,
            balance_addresses,
            exist_metrics_url: target.exist_metrics_url.clone(),
            scale: 10f64.powi(target.effective_decimals() as i32),
            poller,
            registry,
            balance,
            available,
            activated_stake,
            active,
            commission,
            last_vote,
            rank,
            epoch,
            slot_index,
            slots_in_epoch,
            network_tps,
            leader_slots,
            leader_fees,
            delegations,
        })
    }

    /// One getVoteAccounts call covers every tracked vote account: status,
    /// stake, commission, and rank across the whole cluster.
    async fn update_vote_accounts(&self) {
        let value = self
            .poller
            .post_cached(
                &self.api_url,
                json!({"method": "getVoteAccounts"}),
                |json| json.get("result").cloned(),
                Duration::from_secs(60),
            )
            .await;

        let current = value.get("current").and_then(Value::as_array);
        let delinquent = value.get("delinquent").and_then(Value::as_array);
        let (Some(current), Some(delinquent)) = (current, delinquent) else {
            return;
        };

        let mut all: Vec<(&Value, bool)> = current
            .iter()
            .map(|v| (v, true))
            .chain(delinquent.iter().map(|v| (v, false)))
            .collect();
        all.sort_by(|a, b| stake_of(b.0).total_cmp(&stake_of(a.0)));

        for vote in &self.votes {
            let Some(position) = all.iter().position(|(v, _)| {
                v.get("votePubkey").and_then(Value::as_str) == Some(vote.as_str())
            }) else {
                continue;
            };
            let (validator, is_current) = all[position];

            self.activated_stake
                .with_label_values(&[vote])
                .set(stake_of(validator) / self.scale);
            self.active
                .with_label_values(&[vote])
                .set(if is_current { 1.0 } else { 0.0 });
            if let Some(commission) = validator.get("commission").and_then(as_number) {
                self.commission.with_label_values(&[vote]).set(commission);
            }
            if let Some(slot) = validator.get("lastVote").and_then(as_number) {
                self.last_vote.with_label_values(&[vote]).set(slot);
            }
            self.rank
                .with_label_values(&[vote])
                .set((position + 1) as f64);
        }
    }

    async fn update_epoch_info(&self) -> Option<EpochSnapshot> {
        let value = self
            .poller
            .post_cached(
                &self.rpc_url,
                json!({"method": "getEpochInfo", "params": []}),
                |json| json.get("result").cloned(),
                Duration::from_secs(10),
            )
            .await;

        let epoch = value.get("epoch")?.as_u64()?;
        let absolute_slot = value.get("absoluteSlot")?.as_u64()?;
        let slot_index = value.get("slotIndex")?.as_u64()?;
        let slots_in_epoch = value.get("slotsInEpoch")?.as_u64()?;

        self.epoch.set(epoch as f64);
        self.slot_index.set(slot_index as f64);
        self.slots_in_epoch.set(slots_in_epoch as f64);

        Some(EpochSnapshot {
            absolute_slot,
            slot_index,
        })
    }

    async fn update_balances(&self) {
        for address in &self.balance_addresses {
            let body = json!({"method": "getBalance", "params": [address]});
            let value = self
                .poller
                .call_with_fallback(&self.api_url, RequestShape::Post(body), |json| {
                    json.get("result")?.get("value").cloned()
                })
                .await;

            if let Some(lamports) = as_number(&value) {
                let sol = lamports / self.scale;
                self.available.with_label_values(&[address]).set(sol);
                self.balance.with_label_values(&[address]).set(sol);
            }
        }
    }

    async fn update_network_tps(&self) {
        let value = self
            .poller
            .post_cached(
                &self.rpc_url,
                json!({"method": "getRecentPerformanceSamples", "params": [15]}),
                |json| json.get("result").cloned(),
                Duration::from_secs(120),
            )
            .await;

        let Some(samples) = value.as_array() else {
            return;
        };

        let mut transactions = 0.0;
        let mut seconds = 0.0;
        for sample in samples {
            let tx = sample.get("numTransactions").and_then(as_number);
            let secs = sample.get("samplePeriodSecs").and_then(as_number);
            if let (Some(tx), Some(secs)) = (tx, secs) {
                if tx >= 0.0 && secs > 0.0 {
                    transactions += tx;
                    seconds += secs;
                }
            }
        }
        if seconds > 0.0 {
            self.network_tps.set(transactions / seconds);
        }
    }

    /// Leader slots are grouped in 4-slot windows. The schedule itself moves
    /// slowly, but the fee rewards of a completed window never change, so
    /// finished blocks come from the immutable cache.
    async fn update_leader_windows(&self, snapshot: &EpochSnapshot) {
        self.leader_fees.reset();
        let epoch_first_slot = snapshot.absolute_slot.saturating_sub(snapshot.slot_index);

        for identity in &self.identities {
            let body = json!({
                "method": "getLeaderSchedule",
                "params": [Value::Null, {"identity": identity}],
            });
            let value = self
                .poller
                .post_cached(
                    &self.rpc_url,
                    body,
                    |json| json.get("result").cloned(),
                    Duration::from_secs(60),
                )
                .await;

            let Some(slots) = value.get(identity.as_str()).and_then(Value::as_array) else {
                continue;
            };

            self.leader_slots
                .with_label_values(&[identity])
                .set(slots.len() as f64);

            let mut past_window_starts: Vec<u64> = slots
                .iter()
                .filter_map(Value::as_u64)
                .filter(|rel| *rel < snapshot.slot_index)
                .map(|rel| rel / 4 * 4)
                .collect();
            past_window_starts.sort_unstable();
            past_window_starts.dedup();
            let Some(window_start) = past_window_starts.last().copied() else {
                continue;
            };

            let start = epoch_first_slot + window_start;
            let mut lamports = 0.0;
            for slot in start..start + 4 {
                let body = json!({
                    "method": "getBlock",
                    "params": [slot, {"encoding": "json", "transactionDetails": "none", "rewards": true}],
                });
                match self
                    .poller
                    .fetch_immutable(&self.rpc_url, RequestShape::Post(body), |json| {
                        // A skipped slot has no block; keep the null so it is
                        // served without being cached.
                        Some(json.get("result").cloned().unwrap_or(Value::Null))
                    })
                    .await
                {
                    Ok(block) => lamports += fee_rewards(&block),
                    Err(error) => {
                        warn!(slot, error = %error, "failed to fetch block for leader window");
                    }
                }
            }

            self.leader_fees
                .with_label_values(&[identity, &start.to_string()])
                .set(lamports / self.scale);
        }
    }

    async fn update_delegations(&self) {
        self.delegations.reset();
        for vote in &self.votes {
            let url = format!("{}/delegation?vote={vote}", self.delegation_api);
            let ttl = jittered_ttl(Duration::from_secs(60), Duration::from_secs(15));
            let value = self
                .poller
                .get_cached(&url, |payload| Some(payload.clone()), ttl)
                .await;

            let Some(rows) = value.as_array() else {
                continue;
            };
            for row in rows {
                let source = row
                    .get("stake_type")
                    .or_else(|| row.get("stakeType"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                let Some(lamports) = row.get("stake_amount").and_then(as_number) else {
                    continue;
                };
                self.delegations
                    .with_label_values(&[vote, source])
                    .set(lamports / self.scale);
            }
        }
    }
}

#[async_trait]
impl Collector for SolanaCollector {
    fn chain(&self) -> &'static str {
        "solana"
    }

    async fn collect(&self) -> String {
        self.update_vote_accounts().await;
        let snapshot = self.update_epoch_info().await;
        self.update_balances().await;
        self.update_network_tps().await;
        if let Some(snapshot) = snapshot {
            self.update_leader_windows(&snapshot).await;
        }
        self.update_delegations().await;

        let own = match encode_text(&self.registry) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "failed to encode solana registry");
                String::new()
            }
        };
        let exist = load_exist_metrics(&self.poller, self.exist_metrics_url.as_deref()).await;
        join_metrics(own, exist)
    }
}

fn stake_of(validator: &Value) -> f64 {
    validator
        .get("activatedStake")
        .and_then(as_number)
        .unwrap_or(0.0)
}

/// Sums the `Fee` rewards of one block. Null blocks (skipped slots)
/// contribute nothing.
fn fee_rewards(block: &Value) -> f64 {
    let Some(rewards) = block.get("rewards").and_then(Value::as_array) else {
        return 0.0;
    };
    rewards
        .iter()
        .filter(|r| {
            r.get("rewardType")
                .or_else(|| r.get("reward_type"))
                .and_then(Value::as_str)
                == Some("Fee")
        })
        .filter_map(|r| r.get("lamports").and_then(as_number))
        .sum()
}
