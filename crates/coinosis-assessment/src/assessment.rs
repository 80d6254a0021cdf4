//! Assessment session
//!
//! Ties the components together for one (account, event) identity: the clap
//! controls mutate the ledger and mirror each committed delta, `send` hands
//! the frozen ledger to the submitter, and `teardown` compensates the backend
//! mirror when the page goes away before the claps were sent.

use crate::distribution::{DistributionConfig, DistributionNotice, DistributionTrigger};
use crate::report::{watch_result, SettlementReport};
use crate::retrieval::{recover_assessment, RetrievalOutcome};
use crate::roster::PresenceUpdate;
use crate::submission::{ClapSubmitter, SubmissionConfig};
use crate::task::ScheduledTask;
use crate::{
    AssessmentBackend, AssessmentContract, AssessmentError, ClapBeacon, ClapLedger,
    LifecycleEvent, LifecycleManager, MessageSigner, Result, Roster, SessionView,
    SettlementRouter, SyncChannel,
};
use crate::session::{EventRef, SessionIdentity};
use coinosis_types::{
    Address, Attendee, SettlementPath, SettlementRecord, StateEvent, TransactionState,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// External systems an assessment session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub contract: Arc<dyn AssessmentContract>,
    pub backend: Arc<dyn AssessmentBackend>,
    pub signer: Arc<dyn MessageSigner>,
    pub beacon: Arc<dyn ClapBeacon>,
    pub router: Arc<SettlementRouter>,
}

pub struct AssessmentSession {
    account: Address,
    event: EventRef,
    collaborators: Collaborators,
    ledger: Arc<RwLock<ClapLedger>>,
    roster: RwLock<Roster>,
    lifecycle: Arc<LifecycleManager>,
    sync: SyncChannel,
    submitter: ClapSubmitter,
}

impl AssessmentSession {
    /// Open a session for the identity currently in `view`.
    pub fn open(
        view: &SessionView,
        collaborators: Collaborators,
        config: SubmissionConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LifecycleEvent>)> {
        let identity = view.current();
        let (account, event) = identity.known().ok_or(AssessmentError::NoIdentity)?;
        if collaborators.signer.account() != account {
            return Err(AssessmentError::Signing(format!(
                "wallet account {} is not the session account {}",
                collaborators.signer.account(),
                account
            )));
        }

        let (lifecycle, events) = LifecycleManager::with_events();
        let lifecycle = Arc::new(lifecycle);
        let sync = SyncChannel::new(
            event.url.clone(),
            collaborators.signer.clone(),
            collaborators.beacon.clone(),
        );
        let submitter = ClapSubmitter::new(
            collaborators.contract.clone(),
            collaborators.backend.clone(),
            collaborators.signer.clone(),
            collaborators.router.clone(),
            lifecycle.clone(),
            config,
        );

        info!(account = %account.short(), event = %event.url, version = ?event.version, "Assessment session opened");
        let session = Self {
            ledger: Arc::new(RwLock::new(ClapLedger::new(account.clone()))),
            account: account.clone(),
            event: event.clone(),
            collaborators,
            roster: RwLock::new(Roster::new()),
            lifecycle,
            sync,
            submitter,
        };
        Ok((session, events))
    }

    pub fn account(&self) -> &Address {
        &self.account
    }

    pub fn event(&self) -> &EventRef {
        &self.event
    }

    /// Whether `identity` still names this session's account and event.
    /// Once it does not, tear the session down and open a new one.
    pub fn is_current(&self, identity: &SessionIdentity) -> bool {
        identity
            .known()
            .map_or(false, |(account, event)| account == &self.account && event == &self.event)
    }

    /// Merge fetched attendees into the roster; new ones get a zero entry.
    pub async fn load_roster(&self, attendees: Vec<Attendee>) -> usize {
        let added = self.roster.write().await.merge(attendees);
        self.ledger.write().await.ensure_attendees(&added)
    }

    pub async fn update_presence(&self, update: &PresenceUpdate) -> bool {
        self.roster.write().await.update_presence(update)
    }

    pub async fn roster(&self) -> Roster {
        self.roster.read().await.clone()
    }

    /// Resume from a committed assessment kept by the backend, if any.
    pub async fn recover(&self) -> RetrievalOutcome {
        recover_assessment(
            self.collaborators.backend.as_ref(),
            self.event.version,
            &self.event.url,
            &self.account,
            &self.ledger,
            &self.lifecycle,
        )
        .await
    }

    /// Give one clap. Returns the claps still available.
    pub async fn clap(&self, address: &Address) -> Result<i64> {
        self.adjust(address, 1).await
    }

    /// Take one clap back. `None` when the entry is already at zero.
    pub async fn unclap(&self, address: &Address) -> Result<Option<i64>> {
        let mut ledger = self.ledger.write().await;
        let state = self.lifecycle.state().await;
        if state.freezes_ledger() {
            return Err(AssessmentError::LedgerFrozen(state));
        }
        if address == &self.account {
            return Err(AssessmentError::SelfAssessment);
        }
        if !ledger.contains(address) {
            return Err(AssessmentError::UnknownAttendee(address.clone()));
        }
        if !ledger.can_decrement(address, state) {
            debug!(address = %address.short(), "Decrement at floor ignored");
            return Ok(None);
        }
        let remaining = ledger.apply_delta(address, -1)?;
        drop(ledger);
        self.sync.mirror(address, -1);
        Ok(Some(remaining))
    }

    async fn adjust(&self, address: &Address, delta: i64) -> Result<i64> {
        let mut ledger = self.ledger.write().await;
        let state = self.lifecycle.state().await;
        if state.freezes_ledger() {
            return Err(AssessmentError::LedgerFrozen(state));
        }
        let remaining = ledger.apply_delta(address, delta)?;
        drop(ledger);
        self.sync.mirror(address, delta);
        Ok(remaining)
    }

    /// Submit the assessment. Freezes the ledger until it fails or settles.
    pub async fn send(&self) -> Result<SettlementPath> {
        let attendee_count = self.roster.read().await.len();
        self.submitter
            .submit(&self.event.url, &self.ledger, attendee_count)
            .await
    }

    pub async fn state(&self) -> TransactionState {
        self.lifecycle.state().await
    }

    pub async fn assessment(&self) -> BTreeMap<Address, i64> {
        self.ledger.read().await.snapshot()
    }

    pub async fn remaining(&self) -> i64 {
        self.ledger.read().await.remaining()
    }

    pub async fn is_over_budget(&self) -> bool {
        self.ledger.read().await.is_over_budget()
    }

    pub async fn can_increment(&self, address: &Address) -> bool {
        let state = self.lifecycle.state().await;
        self.ledger.read().await.can_increment(address, state)
    }

    pub async fn can_decrement(&self, address: &Address) -> bool {
        let state = self.lifecycle.state().await;
        self.ledger.read().await.can_decrement(address, state)
    }

    pub async fn record(&self) -> Option<SettlementRecord> {
        self.submitter.record().await
    }

    pub async fn send_label(&self) -> &'static str {
        SettlementRecord::label(self.submitter.record().await.as_ref())
    }

    pub async fn last_error(&self) -> Option<String> {
        self.submitter.last_error().await
    }

    /// Payout control for the organizer, sharing this session's state.
    pub fn distribution_trigger(
        &self,
        notify: mpsc::UnboundedSender<DistributionNotice>,
        config: DistributionConfig,
    ) -> DistributionTrigger {
        DistributionTrigger::new(
            self.event.organizer.clone(),
            self.account.clone(),
            self.event.end,
            self.collaborators.contract.clone(),
            self.collaborators.backend.clone(),
            self.lifecycle.clone(),
            notify,
            config,
        )
    }

    /// Result view over the current roster.
    pub async fn watch_result(
        &self,
    ) -> (ScheduledTask, oneshot::Receiver<Result<Option<SettlementReport>>>) {
        watch_result(
            self.collaborators.contract.clone(),
            self.collaborators.backend.clone(),
            self.event.url.clone(),
            self.roster.read().await.clone(),
        )
    }

    /// The contract reported the payout; attendees outside the payout flow become REWARDED.
    pub async fn observe_distribution(&self) -> Result<TransactionState> {
        for from in [TransactionState::Registered, TransactionState::Clapped] {
            if let Some(state) = self
                .lifecycle
                .transition_from(from, StateEvent::DistributionObserved)
                .await?
            {
                return Ok(state);
            }
        }
        Ok(self.lifecycle.state().await)
    }

    /// Zero the assessment and return to REGISTERED, e.g. after the wallet reset.
    /// Unsent claps are withdrawn from the backend mirror first.
    pub async fn reset(&self) -> Result<()> {
        self.submitter.cancel().await;
        let mut ledger = self.ledger.write().await;
        let state = self.lifecycle.state().await;
        self.sync.compensate(&ledger, state);
        ledger.reset();
        drop(ledger);
        self.lifecycle.transition(StateEvent::Reset).await?;
        Ok(())
    }

    /// Stop background work and, if the claps were not sent yet, undo the
    /// mirrored deltas. The returned handles may be dropped.
    pub async fn teardown(&self) -> Vec<JoinHandle<()>> {
        self.submitter.cancel().await;
        let ledger = self.ledger.read().await;
        let state = self.lifecycle.state().await;
        self.sync.compensate(&ledger, state)
    }
}
