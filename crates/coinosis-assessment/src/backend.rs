use crate::Result;
use async_trait::async_trait;
use coinosis_types::{Address, TxHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final assessment relayed by the backend for proxy-custody accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub event: String,
    pub sender: Address,
    pub addresses: Vec<Address>,
    pub claps: Vec<i64>,
    pub signature: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    event: &'a str,
    sender: &'a Address,
    addresses: &'a [Address],
    claps: &'a [i64],
}

impl RelayRequest {
    /// Text the sender signs: the request body without its signature.
    pub fn signing_payload(
        event: &str,
        sender: &Address,
        addresses: &[Address],
        claps: &[i64],
    ) -> Result<String> {
        Ok(serde_json::to_string(&RelayPayload {
            event,
            sender,
            addresses,
            claps,
        })?)
    }
}

/// Gas price recommendation in gwei.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasQuote {
    pub safe: f64,
    pub propose: f64,
}

impl GasQuote {
    pub fn propose_wei(&self) -> u128 {
        (self.propose * 1e9).round() as u128
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionInfo {
    pub eth_price: f64,
}

/// Backend HTTP API consumed by the assessment flows.
#[async_trait]
pub trait AssessmentBackend: Send + Sync {
    /// Previously committed assessment of `account`, `None` when there is none.
    async fn fetch_assessment(
        &self,
        event: &str,
        account: &Address,
    ) -> Result<Option<BTreeMap<Address, i64>>>;

    /// Ask the backend to send the clap transaction. Returns its hash.
    async fn relay_assessment(&self, request: &RelayRequest) -> Result<TxHash>;

    async fn gas_quote(&self) -> Result<GasQuote>;

    /// Distribution bookkeeping of the event, initialised on first read.
    async fn distribution(&self, event: &str) -> Result<DistributionInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propose_wei() {
        let quote = GasQuote {
            safe: 10.0,
            propose: 12.5,
        };
        assert_eq!(quote.propose_wei(), 12_500_000_000);
    }

    #[test]
    fn test_signing_payload_excludes_signature() {
        let sender = Address::from_bytes([1; 20]);
        let payload =
            RelayRequest::signing_payload("ev", &sender, &[Address::from_bytes([2; 20])], &[5])
                .unwrap();
        assert!(payload.starts_with("{\"event\":\"ev\""));
        assert!(!payload.contains("signature"));
    }
}
