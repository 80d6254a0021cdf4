//! Session context
//!
//! Account and event identity shared by every component. Only the holder of
//! [`SessionOwner`] writes it; components hold a cloneable [`SessionView`].

use chrono::{DateTime, Utc};
use coinosis_types::{Address, ContractVersion};
use tokio::sync::watch;
use tracing::info;

/// Event the session is attending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRef {
    pub url: String,
    pub contract: Address,
    pub version: ContractVersion,
    pub organizer: Address,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    pub account: Option<Address>,
    pub name: Option<String>,
    pub event: Option<EventRef>,
}

impl SessionIdentity {
    /// Account and event, once both are known.
    pub fn known(&self) -> Option<(&Address, &EventRef)> {
        match (&self.account, &self.event) {
            (Some(account), Some(event)) => Some((account, event)),
            _ => None,
        }
    }
}

pub struct SessionOwner {
    tx: watch::Sender<SessionIdentity>,
}

#[derive(Clone)]
pub struct SessionView {
    rx: watch::Receiver<SessionIdentity>,
}

impl SessionOwner {
    pub fn new() -> (Self, SessionView) {
        let (tx, rx) = watch::channel(SessionIdentity::default());
        (Self { tx }, SessionView { rx })
    }

    pub fn set_account(&self, account: Option<Address>, name: Option<String>) {
        self.tx.send_if_modified(|identity| {
            if identity.account == account && identity.name == name {
                return false;
            }
            info!(account = ?account, "Session account changed");
            identity.account = account;
            identity.name = name;
            true
        });
    }

    pub fn set_event(&self, event: Option<EventRef>) {
        self.tx.send_if_modified(|identity| {
            if identity.event == event {
                return false;
            }
            info!(event = ?event.as_ref().map(|e| e.url.as_str()), "Session event changed");
            identity.event = event;
            true
        });
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            rx: self.tx.subscribe(),
        }
    }
}

impl SessionView {
    pub fn current(&self) -> SessionIdentity {
        self.rx.borrow().clone()
    }

    /// Wait for the next identity change. `None` once the owner is gone.
    pub async fn changed(&mut self) -> Option<SessionIdentity> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
