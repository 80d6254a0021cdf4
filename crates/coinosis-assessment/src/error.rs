use coinosis_types::{Address, TransactionState, TypesError};
use thiserror::Error;

/// Longest error text shown next to a control.
pub const USER_MESSAGE_LEN: usize = 60;

#[derive(Error, Debug)]
pub enum AssessmentError {
    #[error("Budget exceeded: {remaining} claps remaining, delta {delta}")]
    BudgetExceeded { remaining: i64, delta: i64 },

    #[error("Invalid delta {delta} for an entry of {current} claps")]
    InvalidDelta { current: i64, delta: i64 },

    #[error("Attendees cannot clap for themselves")]
    SelfAssessment,

    #[error("Unknown attendee: {0}")]
    UnknownAttendee(Address),

    #[error("Assessment is frozen in state {0:?}")]
    LedgerFrozen(TransactionState),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(#[from] TypesError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Distribution gate still closed, opens at {0}")]
    GateClosed(chrono::DateTime<chrono::Utc>),

    #[error("Only the organizer {0} can distribute")]
    NotOrganizer(Address),

    #[error("No account or event selected")]
    NoIdentity,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AssessmentError {
    pub fn transport(e: impl std::fmt::Display) -> Self {
        Self::Transport(e.to_string())
    }

    /// Message for the UI, cut to the first 60 characters.
    pub fn user_message(&self) -> String {
        truncate_message(&self.to_string())
    }
}

pub fn truncate_message(message: &str) -> String {
    message.chars().take(USER_MESSAGE_LEN).collect()
}

pub type Result<T> = std::result::Result<T, AssessmentError>;
