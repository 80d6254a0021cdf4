//! Settlement report
//!
//! Rebuilds who clapped how much and who received what after the payout.
//! V2 contracts keep the tallies in storage and announce the payout with a
//! one-time Distribution event; V0 and V1 only left Assessment logs behind.

use crate::task::ScheduledTask;
use crate::{AssessmentBackend, AssessmentContract, AssessmentError, Result, Roster};
use coinosis_types::{Address, ContractVersion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub address: Address,
    pub name: String,
    pub claps: u64,
    /// Wei transferred to the attendee
    pub reward: u128,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub version: ContractVersion,
    pub rows: Vec<ReportRow>,
    pub total_claps: u64,
    /// Registration fee in wei
    pub fee: u128,
    /// Fees collected from every attendee
    pub pot: u128,
    pub eth_price: Option<f64>,
}

impl SettlementReport {
    fn from_rows(version: ContractVersion, rows: Vec<ReportRow>, total_claps: u64, fee: u128) -> Self {
        let pot = fee * rows.len() as u128;
        Self {
            version,
            rows,
            total_claps,
            fee,
            pot,
            eth_price: None,
        }
    }

    pub fn row(&self, address: &Address) -> Option<&ReportRow> {
        self.rows.iter().find(|r| &r.address == address)
    }

    pub fn total_rewards(&self) -> u128 {
        self.rows.iter().map(|r| r.reward).sum()
    }
}

/// Read the V2 contract once its Distribution event fired at `from_block`.
pub async fn reconstruct_from_contract(
    contract: &dyn AssessmentContract,
    roster: &Roster,
    from_block: u64,
) -> Result<SettlementReport> {
    let attendees = contract.attendees().await?;
    let fee = contract.fee().await?;
    let total_claps = contract.total_claps().await?;

    let mut rewards: HashMap<Address, u128> = HashMap::new();
    for transfer in contract.past_transfers(from_block).await? {
        *rewards.entry(transfer.to).or_default() += transfer.value;
    }

    let mut rows = Vec::with_capacity(attendees.len());
    for address in attendees {
        let claps = contract.claps(&address).await?;
        rows.push(ReportRow {
            name: roster.display_name(&address),
            reward: rewards.get(&address).copied().unwrap_or(0),
            claps,
            address,
        });
    }

    debug!(rows = rows.len(), total_claps, "Rebuilt report from contract state");
    Ok(SettlementReport::from_rows(
        ContractVersion::V2,
        rows,
        total_claps,
        fee,
    ))
}

/// Replay V0/V1 Assessment logs. `None` when no log belongs to the event.
pub async fn replay_assessment_logs(
    contract: &dyn AssessmentContract,
    event_url: &str,
    roster: &Roster,
) -> Result<Option<SettlementReport>> {
    let version = contract.version();
    let filter = version
        .assessment_filter(event_url)
        .ok_or_else(|| AssessmentError::Transport(format!("{:?} has no assessment logs", version)))?;

    let identities = roster.addresses();
    let logs = contract.past_assessments(&filter).await?;
    let scanned = logs.len();

    let Some(log) = logs.into_iter().find(|log| {
        version.matches_log(log.topic.as_deref(), &log.attendees, event_url, &identities)
    }) else {
        debug!(version = ?version, scanned, "No assessment log for event");
        return Ok(None);
    };

    if log.claps.len() != log.attendees.len() || log.rewards.len() != log.attendees.len() {
        warn!(block = log.block_number, "Malformed assessment log");
        return Err(AssessmentError::Transport(
            "assessment log arrays differ in length".to_string(),
        ));
    }

    let total_claps = log.claps.iter().sum();
    let rows = log
        .attendees
        .iter()
        .zip(log.claps.iter())
        .zip(log.rewards.iter())
        .map(|((address, claps), reward)| ReportRow {
            address: address.clone(),
            name: roster.display_name(address),
            claps: *claps,
            reward: *reward,
        })
        .collect();

    debug!(version = ?version, scanned, block = log.block_number, "Replayed assessment log");
    Ok(Some(SettlementReport::from_rows(
        version,
        rows,
        total_claps,
        log.registration,
    )))
}

/// Build the report for any contract version, adding the ETH price for display.
pub async fn build_report(
    contract: &dyn AssessmentContract,
    backend: &dyn AssessmentBackend,
    event_url: &str,
    roster: &Roster,
) -> Result<Option<SettlementReport>> {
    let report = if contract.version().replays_assessment_logs() {
        replay_assessment_logs(contract, event_url, roster).await?
    } else {
        let distribution = contract.distribution_event().await?;
        Some(reconstruct_from_contract(contract, roster, distribution.block_number).await?)
    };

    let Some(mut report) = report else {
        return Ok(None);
    };
    match backend.distribution(event_url).await {
        Ok(info) => report.eth_price = Some(info.eth_price),
        Err(e) => warn!(event = event_url, error = %e, "ETH price unavailable for report"),
    }
    Ok(Some(report))
}

/// Result view: waits in the background for the payout, then publishes the report.
pub fn watch_result(
    contract: Arc<dyn AssessmentContract>,
    backend: Arc<dyn AssessmentBackend>,
    event_url: String,
    roster: Roster,
) -> (ScheduledTask, oneshot::Receiver<Result<Option<SettlementReport>>>) {
    let (tx, rx) = oneshot::channel();
    let task = ScheduledTask::spawn("result-view", move |mut cancel| async move {
        let report = tokio::select! {
            _ = cancel.cancelled() => return,
            report = build_report(contract.as_ref(), backend.as_ref(), &event_url, &roster) => report,
        };
        if let Ok(Some(ref r)) = report {
            info!(event = %event_url, rows = r.rows.len(), total_claps = r.total_claps, "📊 Settlement report ready");
        }
        let _ = tx.send(report);
    });
    (task, rx)
}
