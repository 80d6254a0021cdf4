//! Final clap submission
//!
//! Drives CLICKED_SEND -> SENT_CLAPS -> CLAPPED over one of two paths:
//! - DIRECT: the attendee's wallet sends `clap(addresses, claps)` and reports
//!   `transactionHash` then `receipt`
//! - PROXY: the signed assessment is relayed by the backend and mining is
//!   detected by [`ConfirmationPoller`]
//!
//! Any failure before CLAPPED rolls back to REGISTERED, which unfreezes the
//! ledger, and keeps a truncated message for the UI.

use crate::confirmation::{ConfirmationPoller, DEFAULT_POLL_INTERVAL};
use crate::error::truncate_message;
use crate::task::ScheduledTask;
use crate::{
    AssessmentBackend, AssessmentContract, AssessmentError, ClapLedger, LifecycleManager,
    MessageSigner, RelayRequest, Result, SendOptions, SettlementRouter, TxEvent,
};
use coinosis_types::{
    clap_gas_limit, SettlementPath, SettlementRecord, StateEvent, TransactionState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// 20 gwei
pub const DEFAULT_CLAP_GAS_PRICE: u128 = 20_000_000_000;

#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    /// Fixed gas price of direct clap calls, in wei
    pub gas_price: u128,
    pub poll_interval: Duration,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            gas_price: DEFAULT_CLAP_GAS_PRICE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub struct ClapSubmitter {
    contract: Arc<dyn AssessmentContract>,
    backend: Arc<dyn AssessmentBackend>,
    signer: Arc<dyn MessageSigner>,
    router: Arc<SettlementRouter>,
    lifecycle: Arc<LifecycleManager>,
    record: Arc<RwLock<Option<SettlementRecord>>>,
    last_error: RwLock<Option<String>>,
    poller: Mutex<Option<ScheduledTask>>,
    config: SubmissionConfig,
}

impl ClapSubmitter {
    pub fn new(
        contract: Arc<dyn AssessmentContract>,
        backend: Arc<dyn AssessmentBackend>,
        signer: Arc<dyn MessageSigner>,
        router: Arc<SettlementRouter>,
        lifecycle: Arc<LifecycleManager>,
        config: SubmissionConfig,
    ) -> Self {
        Self {
            contract,
            backend,
            signer,
            router,
            lifecycle,
            record: Arc::new(RwLock::new(None)),
            last_error: RwLock::new(None),
            poller: Mutex::new(None),
            config,
        }
    }

    pub async fn record(&self) -> Option<SettlementRecord> {
        self.record.read().await.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Submit the frozen assessment of `ledger` for an event with
    /// `attendee_count` registered attendees.
    ///
    /// DIRECT returns once the receipt arrived; PROXY returns once the relay
    /// was accepted and leaves confirmation to the background poller.
    pub async fn submit(
        &self,
        event: &str,
        ledger: &RwLock<ClapLedger>,
        attendee_count: usize,
    ) -> Result<SettlementPath> {
        self.lifecycle.transition(StateEvent::ClickSend).await?;
        *self.last_error.write().await = None;
        *self.record.write().await = None;

        let (addresses, claps) = ledger.read().await.submission();
        let account = self.signer.account().clone();

        let outcome = match self.router.resolve(self.contract.as_ref(), &account).await {
            Ok(SettlementPath::Direct) => self
                .submit_direct(&addresses, &claps, attendee_count)
                .await
                .map(|_| SettlementPath::Direct),
            Ok(SettlementPath::Proxy) => self
                .submit_relayed(event, &addresses, &claps)
                .await
                .map(|_| SettlementPath::Proxy),
            Err(e) => Err(e),
        };

        if let Err(ref e) = outcome {
            self.roll_back(e).await;
        }
        outcome
    }

    async fn submit_direct(
        &self,
        addresses: &[coinosis_types::Address],
        claps: &[i64],
        attendee_count: usize,
    ) -> Result<()> {
        let options = SendOptions {
            from: self.signer.account().clone(),
            gas: Some(clap_gas_limit(attendee_count)),
            gas_price: self.config.gas_price,
        };
        debug!(
            attendees = attendee_count,
            gas = ?options.gas,
            gas_price = options.gas_price,
            "Sending clap transaction"
        );

        let mut events = self.contract.clap(addresses, claps, options).await?;
        while let Some(event) = events.recv().await {
            match event {
                TxEvent::TransactionHash(hash) => {
                    *self.record.write().await = Some(SettlementRecord::pending(hash.clone()));
                    self.lifecycle.transition(StateEvent::ClapsSent).await?;
                    info!(tx = %hash, "📝 Clap transaction sent");
                }
                TxEvent::Receipt(receipt) => {
                    if let Some(record) = self.record.write().await.as_mut() {
                        record.confirm();
                    }
                    self.lifecycle.transition(StateEvent::ClapsMined).await?;
                    info!(
                        tx = %receipt.transaction_hash,
                        block = receipt.block_number,
                        "✅ Clap transaction mined"
                    );
                    return Ok(());
                }
                TxEvent::Error(message) => return Err(AssessmentError::Transport(message)),
            }
        }

        Err(AssessmentError::Transport(
            "wallet closed the transaction stream".to_string(),
        ))
    }

    async fn submit_relayed(
        &self,
        event: &str,
        addresses: &[coinosis_types::Address],
        claps: &[i64],
    ) -> Result<()> {
        let sender = self.signer.account().clone();
        let payload = RelayRequest::signing_payload(event, &sender, addresses, claps)?;
        let signature = self.signer.sign(&payload).await?;

        let request = RelayRequest {
            event: event.to_string(),
            sender,
            addresses: addresses.to_vec(),
            claps: claps.to_vec(),
            signature,
        };
        let hash = self.backend.relay_assessment(&request).await?;

        *self.record.write().await = Some(SettlementRecord::pending(hash.clone()));
        self.lifecycle.transition(StateEvent::ClapsSent).await?;
        info!(tx = %hash, "📝 Claps relayed by backend");

        let poller = ConfirmationPoller::new(
            self.contract.clone(),
            self.lifecycle.clone(),
            self.record.clone(),
            self.config.poll_interval,
        );
        if let Some(previous) = self.poller.lock().await.replace(poller.start(hash)) {
            previous.cancel();
        }
        Ok(())
    }

    async fn roll_back(&self, error: &AssessmentError) {
        let message = truncate_message(&error.to_string());
        warn!(error = %error, "❌ Clap submission failed, rolling back");

        let state = self.lifecycle.state().await;
        if matches!(
            state,
            TransactionState::ClickedSend | TransactionState::SentClaps
        ) {
            if let Err(e) = self.lifecycle.transition(StateEvent::ClapsFailed).await {
                warn!(error = %e, "Rollback transition rejected");
            }
        }
        *self.record.write().await = None;
        *self.last_error.write().await = Some(message);
    }

    /// Stop the relay confirmation poll, if one runs.
    pub async fn cancel(&self) {
        if let Some(poller) = self.poller.lock().await.take() {
            poller.cancel();
        }
    }
}
