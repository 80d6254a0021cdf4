use crate::{AssessmentBackend, ClapLedger, LifecycleManager};
use coinosis_types::{Address, ContractVersion, StateEvent, TransactionState};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// What the backend said about an earlier submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// A committed assessment replaced the ledger; the session is read-only
    Resumed,
    /// Nothing was submitted yet
    Fresh,
    /// The version commits on chain only, nothing to recover
    Skipped,
    /// The lookup failed, or found nothing while the session is past
    /// REGISTERED; state left as it was
    Unavailable,
}

/// Recover a committed assessment of `account` for `event`, if any.
pub async fn recover_assessment(
    backend: &dyn AssessmentBackend,
    version: ContractVersion,
    event: &str,
    account: &Address,
    ledger: &RwLock<ClapLedger>,
    lifecycle: &LifecycleManager,
) -> RetrievalOutcome {
    if !version.recovers_prior_assessment() {
        debug!(version = ?version, "No backend assessment for this contract version");
        return RetrievalOutcome::Skipped;
    }

    match backend.fetch_assessment(event, account).await {
        Ok(Some(assessment)) => {
            let entries = assessment.len();
            if let Err(e) = lifecycle.transition(StateEvent::Recovered).await {
                warn!(error = %e, "Recovered assessment in unexpected state");
                return RetrievalOutcome::Unavailable;
            }
            ledger.write().await.replace(assessment);
            info!(event, account = %account.short(), entries, "Resumed committed assessment");
            RetrievalOutcome::Resumed
        }
        Ok(None) => {
            // a missing backend copy never undoes progress made in this session
            match lifecycle
                .transition_from(TransactionState::Registered, StateEvent::NotSubmitted)
                .await
            {
                Ok(Some(_)) => {
                    debug!(event, account = %account.short(), "No committed assessment");
                    RetrievalOutcome::Fresh
                }
                Ok(None) => {
                    let state = lifecycle.state().await;
                    debug!(event, account = %account.short(), state = ?state, "No backend assessment, keeping local state");
                    RetrievalOutcome::Unavailable
                }
                Err(e) => {
                    warn!(error = %e, "Could not record missing assessment");
                    RetrievalOutcome::Unavailable
                }
            }
        }
        Err(e) => {
            warn!(event, account = %account.short(), error = %e, "Assessment lookup failed");
            RetrievalOutcome::Unavailable
        }
    }
}
