use crate::Result;
use coinosis_types::{StateEvent, TransactionState};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Lifecycle event emitted after a successful state transition
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub from_state: TransactionState,
    pub to_state: TransactionState,
    pub event: StateEvent,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Owner of the transaction state of one attendee for one event.
///
/// Every change goes through [`TransactionState::apply`], so skipped or
/// reordered transitions are rejected instead of silently applied.
pub struct LifecycleManager {
    state: RwLock<TransactionState>,
    event_tx: Option<mpsc::UnboundedSender<LifecycleEvent>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TransactionState::Registered),
            event_tx: None,
        }
    }

    /// Create a lifecycle manager with event emission
    pub fn with_events() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            state: RwLock::new(TransactionState::Registered),
            event_tx: Some(tx),
        };
        (manager, rx)
    }

    pub async fn state(&self) -> TransactionState {
        *self.state.read().await
    }

    /// Apply `event` and return the new state.
    pub async fn transition(&self, event: StateEvent) -> Result<TransactionState> {
        let mut state = self.state.write().await;
        let from = *state;
        let to = from.apply(&event)?;
        *state = to;
        drop(state);

        if from != to {
            info!(from = ?from, to = ?to, event = event.name(), "🔄 Transaction state changed");
        }
        self.emit(from, to, event);
        Ok(to)
    }

    /// Apply `event` only if the current state is `expected`.
    ///
    /// Used by background tasks that may race with a reset.
    pub async fn transition_from(
        &self,
        expected: TransactionState,
        event: StateEvent,
    ) -> Result<Option<TransactionState>> {
        let mut state = self.state.write().await;
        if *state != expected {
            debug!(
                expected = ?expected,
                actual = ?*state,
                event = event.name(),
                "Skipping stale transition"
            );
            return Ok(None);
        }
        let to = state.apply(&event)?;
        *state = to;
        drop(state);

        info!(from = ?expected, to = ?to, event = event.name(), "🔄 Transaction state changed");
        self.emit(expected, to, event);
        Ok(Some(to))
    }

    fn emit(&self, from: TransactionState, to: TransactionState, event: StateEvent) {
        let Some(ref tx) = self.event_tx else {
            return;
        };
        let lifecycle_event = LifecycleEvent {
            from_state: from,
            to_state: to,
            event,
            timestamp: chrono::Utc::now(),
        };
        if let Err(e) = tx.send(lifecycle_event) {
            warn!(error = %e, "Failed to emit lifecycle event");
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
