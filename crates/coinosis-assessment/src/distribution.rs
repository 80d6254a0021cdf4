//! Distribution trigger
//!
//! Organizer-only payout. The control stays disabled until the commitment
//! window after the event end has elapsed; the gate watcher re-reads the wall
//! clock every 10 s and publishes the open/closed flag.

use crate::error::truncate_message;
use crate::task::ScheduledTask;
use crate::{
    AssessmentBackend, AssessmentContract, AssessmentError, LifecycleManager, Result,
    SendOptions, TxEvent,
};
use chrono::{DateTime, Utc};
use coinosis_types::{Address, SettlementRecord, StateEvent, TransactionState, TxHash};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_COMMITMENT_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_GATE_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DistributionConfig {
    /// Time after the event end during which claps may still be committed
    pub commitment_window: Duration,
    pub gate_poll_interval: Duration,
    pub gas_limit: Option<u64>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            commitment_window: DEFAULT_COMMITMENT_WINDOW,
            gate_poll_interval: DEFAULT_GATE_POLL_INTERVAL,
            gas_limit: None,
        }
    }
}

/// Opening time of the distribute control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionGate {
    opens_at: DateTime<Utc>,
}

impl DistributionGate {
    pub fn new(event_end: DateTime<Utc>, commitment_window: Duration) -> Self {
        let window = chrono::Duration::from_std(commitment_window)
            .unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            opens_at: event_end + window,
        }
    }

    pub fn opens_at(&self) -> DateTime<Utc> {
        self.opens_at
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now >= self.opens_at
    }

    /// Poll the wall clock every `interval` until the gate opens.
    pub fn watch(self, interval: Duration) -> (ScheduledTask, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(self.is_open(Utc::now()));
        let task = ScheduledTask::spawn("distribution-gate", move |mut cancel| async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let open = self.is_open(Utc::now());
                tx.send_if_modified(|current| {
                    let changed = *current != open;
                    *current = open;
                    changed
                });
                if open {
                    debug!(opens_at = %self.opens_at, "Distribution gate open");
                    return;
                }
            }
        });
        (task, rx)
    }
}

/// Sent to the parent once funds were paid out so it refreshes shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionNotice {
    pub transaction_hash: TxHash,
    pub block_number: u64,
}

pub struct DistributionTrigger {
    organizer: Address,
    account: Address,
    gate: DistributionGate,
    contract: Arc<dyn AssessmentContract>,
    backend: Arc<dyn AssessmentBackend>,
    lifecycle: Arc<LifecycleManager>,
    notify: mpsc::UnboundedSender<DistributionNotice>,
    record: RwLock<Option<SettlementRecord>>,
    last_error: RwLock<Option<String>>,
    config: DistributionConfig,
}

impl DistributionTrigger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        organizer: Address,
        account: Address,
        event_end: DateTime<Utc>,
        contract: Arc<dyn AssessmentContract>,
        backend: Arc<dyn AssessmentBackend>,
        lifecycle: Arc<LifecycleManager>,
        notify: mpsc::UnboundedSender<DistributionNotice>,
        config: DistributionConfig,
    ) -> Self {
        Self {
            gate: DistributionGate::new(event_end, config.commitment_window),
            organizer,
            account,
            contract,
            backend,
            lifecycle,
            notify,
            record: RwLock::new(None),
            last_error: RwLock::new(None),
            config,
        }
    }

    pub fn gate(&self) -> DistributionGate {
        self.gate
    }

    /// Gate watcher for the control; cancel it when the control goes away.
    pub fn watch_gate(&self) -> (ScheduledTask, watch::Receiver<bool>) {
        self.gate.watch(self.config.gate_poll_interval)
    }

    pub async fn record(&self) -> Option<SettlementRecord> {
        self.record.read().await.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Pay out the reward pool. Returns the distribution transaction hash once mined.
    pub async fn distribute(&self) -> Result<TxHash> {
        if self.account != self.organizer {
            return Err(AssessmentError::NotOrganizer(self.organizer.clone()));
        }
        if !self.gate.is_open(Utc::now()) {
            return Err(AssessmentError::GateClosed(self.gate.opens_at()));
        }

        let previous = self.lifecycle.state().await;
        self.lifecycle.transition(StateEvent::ClickDistribute).await?;
        *self.last_error.write().await = None;

        match self.send_distribution().await {
            Ok(hash) => Ok(hash),
            Err(e) => {
                self.roll_back(previous, &e).await;
                Err(e)
            }
        }
    }

    async fn send_distribution(&self) -> Result<TxHash> {
        let quote = self.backend.gas_quote().await?;
        let options = SendOptions {
            from: self.account.clone(),
            gas: self.config.gas_limit,
            gas_price: quote.propose_wei(),
        };
        debug!(gas_price = options.gas_price, "Sending distribution");

        let mut events = self.contract.distribute(options).await?;
        while let Some(event) = events.recv().await {
            match event {
                TxEvent::TransactionHash(hash) => {
                    *self.record.write().await = Some(SettlementRecord::pending(hash.clone()));
                    self.lifecycle.transition(StateEvent::DistributionSent).await?;
                    info!(tx = %hash, "📝 Distribution sent");
                }
                TxEvent::Receipt(receipt) => {
                    if let Some(record) = self.record.write().await.as_mut() {
                        record.confirm();
                    }
                    self.lifecycle
                        .transition(StateEvent::DistributionMined)
                        .await?;
                    info!(tx = %receipt.transaction_hash, block = receipt.block_number, "💸 Rewards distributed");

                    let notice = DistributionNotice {
                        transaction_hash: receipt.transaction_hash.clone(),
                        block_number: receipt.block_number,
                    };
                    if self.notify.send(notice).is_err() {
                        debug!("Nobody listens for distribution notices");
                    }
                    return Ok(receipt.transaction_hash);
                }
                TxEvent::Error(message) => return Err(AssessmentError::Transport(message)),
            }
        }

        Err(AssessmentError::Transport(
            "wallet closed the transaction stream".to_string(),
        ))
    }

    async fn roll_back(&self, previous: TransactionState, error: &AssessmentError) {
        warn!(error = %error, previous = ?previous, "❌ Distribution failed, rolling back");
        if let Err(e) = self
            .lifecycle
            .transition(StateEvent::DistributionFailed { previous })
            .await
        {
            warn!(error = %e, "Rollback transition rejected");
        }
        *self.record.write().await = None;
        *self.last_error.write().await = Some(truncate_message(&error.to_string()));
    }
}
