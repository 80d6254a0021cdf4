//! Confirmation of relayed transactions
//!
//! The backend only returns the hash of the transaction it sent for a proxy
//! account, so mining is detected by polling the chain for the block hash.
//! The poll never gives up; it stops once the block hash is seen or when the
//! owning component cancels it.

use crate::task::{Cancellation, ScheduledTask};
use crate::{AssessmentContract, LifecycleManager};
use coinosis_types::{SettlementRecord, StateEvent, TransactionState, TxHash};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub struct ConfirmationPoller {
    contract: Arc<dyn AssessmentContract>,
    lifecycle: Arc<LifecycleManager>,
    record: Arc<RwLock<Option<SettlementRecord>>>,
    interval: Duration,
}

impl ConfirmationPoller {
    pub fn new(
        contract: Arc<dyn AssessmentContract>,
        lifecycle: Arc<LifecycleManager>,
        record: Arc<RwLock<Option<SettlementRecord>>>,
        interval: Duration,
    ) -> Self {
        Self {
            contract,
            lifecycle,
            record,
            interval,
        }
    }

    /// Start polling for `hash` in the background.
    pub fn start(self, hash: TxHash) -> ScheduledTask {
        ScheduledTask::spawn("relay-confirmation", move |cancel| async move {
            self.wait_for_block(hash, cancel).await;
        })
    }

    /// Poll until the transaction is in a block, then move SENT_CLAPS to CLAPPED once.
    pub async fn wait_for_block(&self, hash: TxHash, mut cancel: Cancellation) {
        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut attempts: u64 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(tx = %hash, attempts, "Relay confirmation poll cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }
            attempts += 1;

            match self.contract.transaction_block_hash(&hash).await {
                Ok(Some(block_hash)) => {
                    if let Some(record) = self.record.write().await.as_mut() {
                        if record.transaction_hash == hash {
                            record.confirm();
                        }
                    }
                    match self
                        .lifecycle
                        .transition_from(TransactionState::SentClaps, StateEvent::ClapsMined)
                        .await
                    {
                        Ok(Some(_)) => info!(
                            tx = %hash,
                            block = %block_hash,
                            attempts,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "✅ Relayed claps mined"
                        ),
                        Ok(None) => {}
                        Err(e) => warn!(tx = %hash, error = %e, "Could not record mined claps"),
                    }
                    return;
                }
                Ok(None) => {
                    debug!(tx = %hash, attempts, "Relayed transaction not mined yet");
                }
                Err(e) => {
                    warn!(tx = %hash, attempts, error = %e, "Relay confirmation poll failed, retrying");
                }
            }
        }
    }
}
