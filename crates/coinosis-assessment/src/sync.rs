//! Optimistic sync channel
//!
//! Every committed clap delta is mirrored to the backend so a closed tab does
//! not lose the partial assessment. Mirrors are detached best-effort tasks:
//! nothing awaits them, nothing retries them, and the backend sums deltas in
//! whatever order they arrive.

use crate::{ClapLedger, MessageSigner};
use coinosis_types::{Address, TransactionState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Body of `POST /clap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClapMessage {
    pub event: String,
    pub clapper: Address,
    pub clapee: Address,
    pub delta: i64,
    pub signature: String,
}

impl ClapMessage {
    pub fn signing_payload(event: &str, clapper: &Address, clapee: &Address, delta: i64) -> String {
        format!("coinosis:clap:{}:{}:{}:{}", event, clapper, clapee, delta)
    }
}

/// Non-blocking, unacknowledged transport that keeps working during teardown.
pub trait ClapBeacon: Send + Sync {
    /// Queue `message` for delivery. Returns whether it was queued.
    fn dispatch(&self, message: ClapMessage) -> bool;
}

#[derive(Clone)]
pub struct SyncChannel {
    event: String,
    signer: Arc<dyn MessageSigner>,
    beacon: Arc<dyn ClapBeacon>,
}

impl SyncChannel {
    pub fn new(
        event: impl Into<String>,
        signer: Arc<dyn MessageSigner>,
        beacon: Arc<dyn ClapBeacon>,
    ) -> Self {
        Self {
            event: event.into(),
            signer,
            beacon,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Mirror one committed delta. The handle may be dropped.
    pub fn mirror(&self, clapee: &Address, delta: i64) -> JoinHandle<()> {
        let event = self.event.clone();
        let signer = self.signer.clone();
        let beacon = self.beacon.clone();
        let clapee = clapee.clone();

        tokio::spawn(async move {
            let clapper = signer.account().clone();
            let payload = ClapMessage::signing_payload(&event, &clapper, &clapee, delta);
            let signature = match signer.sign(&payload).await {
                Ok(signature) => signature,
                Err(e) => {
                    warn!(clapee = %clapee.short(), delta, error = %e, "Skipping clap mirror, signing failed");
                    return;
                }
            };

            let queued = beacon.dispatch(ClapMessage {
                event,
                clapper,
                clapee: clapee.clone(),
                delta,
                signature,
            });
            if queued {
                debug!(clapee = %clapee.short(), delta, "Clap delta mirrored");
            } else {
                warn!(clapee = %clapee.short(), delta, "Beacon refused clap delta");
            }
        })
    }

    /// Return the backend view to zero when the session is abandoned before
    /// the claps were sent: mirror the negation of every non-zero entry.
    pub fn compensate(&self, ledger: &ClapLedger, state: TransactionState) -> Vec<JoinHandle<()>> {
        if state >= TransactionState::SentClaps {
            return Vec::new();
        }

        let handles: Vec<_> = ledger
            .non_zero()
            .map(|(address, claps)| self.mirror(address, -claps))
            .collect();

        if !handles.is_empty() {
            debug!(entries = handles.len(), state = ?state, "Compensating abandoned assessment");
        }
        handles
    }
}
