use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("Unknown contract version: {0}")]
    UnknownVersion(u8),

    #[error("Invalid transition from {from:?} on {event}")]
    InvalidTransition {
        from: crate::TransactionState,
        event: String,
    },
}

pub type Result<T> = std::result::Result<T, TypesError>;
