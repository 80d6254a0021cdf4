use crate::{Result, TxHash, TypesError};
use serde::{Deserialize, Serialize};

/// Where an attendee stands in the clap and distribution flows of one event.
///
/// Variants are declared in ordinal order, so `Ord` agrees with `as_f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    Registered,
    ClickedSend,
    SentClaps,
    Clapped,
    ClickedDistribute,
    SentDistribution,
    Rewarded,
}

impl TransactionState {
    /// Numeric scale used by the web front end and the backend.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Registered => 1.0,
            Self::ClickedSend => 1.8,
            Self::SentClaps => 1.9,
            Self::Clapped => 2.0,
            Self::ClickedDistribute => 2.8,
            Self::SentDistribution => 2.9,
            Self::Rewarded => 3.0,
        }
    }

    /// Once the send button is clicked the assessment can no longer change.
    pub fn freezes_ledger(&self) -> bool {
        *self >= Self::ClickedSend
    }

    /// States in which a flow has an external call outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::ClickedSend | Self::SentClaps | Self::ClickedDistribute | Self::SentDistribution
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rewarded)
    }

    /// Compute the state reached by `event`, rejecting transitions the flows never take.
    pub fn apply(self, event: &StateEvent) -> Result<Self> {
        use StateEvent::*;
        use TransactionState::*;

        let next = match (self, event) {
            (_, Reset) => Some(Registered),

            (Registered, ClickSend) => Some(ClickedSend),
            (ClickedSend, ClapsSent) => Some(SentClaps),
            (SentClaps, ClapsMined) => Some(Clapped),
            (ClickedSend | SentClaps, ClapsFailed) => Some(Registered),

            (Registered | Clapped, Recovered) => Some(Clapped),
            (Registered, NotSubmitted) => Some(Registered),

            (Registered | Clapped, ClickDistribute) => Some(ClickedDistribute),
            (ClickedDistribute, DistributionSent) => Some(SentDistribution),
            (SentDistribution, DistributionMined) => Some(Rewarded),
            (ClickedDistribute | SentDistribution, DistributionFailed { previous })
                if *previous < ClickedDistribute =>
            {
                Some(*previous)
            }

            (Registered | Clapped, DistributionObserved) => Some(Rewarded),
            _ => None,
        };

        next.ok_or_else(|| TypesError::InvalidTransition {
            from: self,
            event: event.name().to_string(),
        })
    }
}

impl Default for TransactionState {
    fn default() -> Self {
        Self::Registered
    }
}

/// Trigger that moves a `TransactionState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateEvent {
    /// Account or event identity changed
    Reset,
    ClickSend,
    /// Contract accepted the call or the backend accepted the relay
    ClapsSent,
    ClapsMined,
    ClapsFailed,
    /// A committed assessment was found on the backend
    Recovered,
    /// The backend has no assessment for this attendee
    NotSubmitted,
    ClickDistribute,
    DistributionSent,
    DistributionMined,
    DistributionFailed { previous: TransactionState },
    /// The contract emitted its Distribution event
    DistributionObserved,
}

impl StateEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::ClickSend => "click_send",
            Self::ClapsSent => "claps_sent",
            Self::ClapsMined => "claps_mined",
            Self::ClapsFailed => "claps_failed",
            Self::Recovered => "recovered",
            Self::NotSubmitted => "not_submitted",
            Self::ClickDistribute => "click_distribute",
            Self::DistributionSent => "distribution_sent",
            Self::DistributionMined => "distribution_mined",
            Self::DistributionFailed { .. } => "distribution_failed",
            Self::DistributionObserved => "distribution_observed",
        }
    }
}

/// Accepted submission, confirmed once mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    pub transaction_hash: TxHash,
    pub confirmed: bool,
}

impl SettlementRecord {
    pub fn pending(transaction_hash: TxHash) -> Self {
        Self {
            transaction_hash,
            confirmed: false,
        }
    }

    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    /// Label of the send control for a given record.
    pub fn label(record: Option<&SettlementRecord>) -> &'static str {
        match record {
            Some(r) if r.confirmed => "sent",
            Some(_) => "sending",
            None => "send",
        }
    }
}
