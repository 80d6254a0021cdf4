use crate::Result;
use async_trait::async_trait;
use coinosis_types::{Address, ContractVersion, LogFilter, TxHash};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress of a sent transaction, in the order the wallet reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    TransactionHash(TxHash),
    Receipt(TxReceipt),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    pub block_hash: String,
    pub block_number: u64,
}

pub type TxEvents = mpsc::UnboundedReceiver<TxEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    pub from: Address,
    pub gas: Option<u64>,
    pub gas_price: u128,
}

/// Reward transfer emitted by the payout routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLog {
    pub to: Address,
    pub value: u128,
    pub block_number: u64,
}

/// Assessment log of the V0 and V1 contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentLog {
    /// First indexed topic, only present on V1
    pub topic: Option<String>,
    pub registration: u128,
    pub attendees: Vec<Address>,
    pub claps: Vec<u64>,
    pub rewards: Vec<u128>,
    pub block_number: u64,
}

/// One-time event of the V2 contract once funds were paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionLog {
    pub block_number: u64,
    pub transaction_hash: TxHash,
}

/// Handle on a deployed assessment contract.
#[async_trait]
pub trait AssessmentContract: Send + Sync {
    fn address(&self) -> &Address;

    fn version(&self) -> ContractVersion;

    /// Delegation flag of `account`, nonzero when the backend pays its gas.
    async fn proxy(&self, account: &Address) -> Result<u64>;

    async fn clap(
        &self,
        addresses: &[Address],
        claps: &[i64],
        options: SendOptions,
    ) -> Result<TxEvents>;

    async fn distribute(&self, options: SendOptions) -> Result<TxEvents>;

    async fn fee(&self) -> Result<u128>;

    async fn total_claps(&self) -> Result<u64>;

    async fn claps(&self, account: &Address) -> Result<u64>;

    async fn attendees(&self) -> Result<Vec<Address>>;

    async fn past_transfers(&self, from_block: u64) -> Result<Vec<TransferLog>>;

    async fn past_assessments(&self, filter: &LogFilter) -> Result<Vec<AssessmentLog>>;

    /// Resolves once the Distribution event has been emitted.
    async fn distribution_event(&self) -> Result<DistributionLog>;

    /// Block hash of a transaction, `None` while it is not mined.
    async fn transaction_block_hash(&self, hash: &TxHash) -> Result<Option<String>>;
}
