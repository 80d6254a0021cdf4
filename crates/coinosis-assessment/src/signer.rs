use crate::Result;
use async_trait::async_trait;
use coinosis_types::Address;

/// Wallet of the active account.
///
/// Signing may block on a user prompt; that suspends only the flow that asked.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    fn account(&self) -> &Address;

    async fn sign(&self, payload: &str) -> Result<String>;
}
