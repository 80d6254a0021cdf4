pub mod assessment;
pub mod backend;
pub mod confirmation;
pub mod contract;
pub mod distribution;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod report;
pub mod retrieval;
pub mod roster;
pub mod router;
pub mod session;
pub mod signer;
pub mod submission;
pub mod sync;
pub mod task;

pub use assessment::{AssessmentSession, Collaborators};
pub use backend::{AssessmentBackend, DistributionInfo, GasQuote, RelayRequest};
pub use confirmation::{ConfirmationPoller, DEFAULT_POLL_INTERVAL};
pub use contract::{
    AssessmentContract, AssessmentLog, DistributionLog, SendOptions, TransferLog, TxEvent,
    TxEvents, TxReceipt,
};
pub use distribution::{
    DistributionConfig, DistributionGate, DistributionNotice, DistributionTrigger,
    DEFAULT_COMMITMENT_WINDOW, DEFAULT_GATE_POLL_INTERVAL,
};
pub use error::{AssessmentError, Result};
pub use ledger::ClapLedger;
pub use lifecycle::{LifecycleEvent, LifecycleManager};
pub use report::{build_report, watch_result, ReportRow, SettlementReport};
pub use retrieval::{recover_assessment, RetrievalOutcome};
pub use roster::{PresenceUpdate, Roster};
pub use router::SettlementRouter;
pub use session::{EventRef, SessionIdentity, SessionOwner, SessionView};
pub use signer::MessageSigner;
pub use submission::{ClapSubmitter, SubmissionConfig, DEFAULT_CLAP_GAS_PRICE};
pub use sync::{ClapBeacon, ClapMessage, SyncChannel};
pub use task::{Cancellation, ScheduledTask};
