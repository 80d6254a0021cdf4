use crate::{AssessmentContract, Result};
use coinosis_types::{Address, SettlementPath};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Picks who sends the final clap transaction and remembers the answer for
/// the rest of the session.
#[derive(Default)]
pub struct SettlementRouter {
    cache: RwLock<HashMap<(Address, Address), SettlementPath>>,
}

impl SettlementRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &self,
        contract: &dyn AssessmentContract,
        account: &Address,
    ) -> Result<SettlementPath> {
        let key = (contract.address().clone(), account.clone());
        if let Some(path) = self.cache.read().await.get(&key) {
            return Ok(*path);
        }

        let path = if contract.version().proxy_eligible() {
            let flag = contract.proxy(account).await?;
            if flag != 0 {
                SettlementPath::Proxy
            } else {
                SettlementPath::Direct
            }
        } else {
            debug!(version = ?contract.version(), "Contract version has no relay path");
            SettlementPath::Direct
        };

        info!(
            contract = %key.0.short(),
            account = %account.short(),
            path = ?path,
            "Settlement path resolved"
        );
        self.cache.write().await.insert(key, path);
        Ok(path)
    }

    pub async fn cached(&self, contract: &Address, account: &Address) -> Option<SettlementPath> {
        self.cache
            .read()
            .await
            .get(&(contract.clone(), account.clone()))
            .copied()
    }
}
