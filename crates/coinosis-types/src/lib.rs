pub mod address;
pub mod error;
pub mod state;
pub mod version;

pub use address::{Address, Attendee, TxHash};
pub use error::{Result, TypesError};
pub use state::{SettlementRecord, StateEvent, TransactionState};
pub use version::{event_topic, ContractVersion, LogFilter, SettlementPath};

/// Claps each attendee may hand out per event.
pub const TOTAL_BUDGET: i64 = 100;

/// Gas limit of a direct `clap` call: per-attendee storage plus a fixed base.
pub fn clap_gas_limit(attendee_count: usize) -> u64 {
    8500 * attendee_count as u64 + 40000
}
