//! Historical contract versions.
//!
//! Three binary-incompatible contracts are deployed. Each version decides:
//! - how past `Assessment` logs are selected (topic filter or full replay)
//! - whether a committed assessment may already live on the backend
//! - whether the relayed (proxy) settlement path exists

use crate::{Address, Result, TypesError};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ContractVersion {
    V0,
    V1,
    V2,
}

/// How past `Assessment` logs are queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFilter {
    /// Every log the contract ever emitted
    Unfiltered,
    /// Logs whose first indexed topic equals this keccak-256 hash
    EventTopic(String),
}

/// Settlement path of the final assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementPath {
    /// The attendee signs and sends the contract call
    Direct,
    /// The backend relays the call on the attendee's behalf
    Proxy,
}

impl ContractVersion {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(TypesError::UnknownVersion(other)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::V0 => 0,
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// V2 commits atomically on chain, so only V0 and V1 can resume from the backend.
    pub fn recovers_prior_assessment(&self) -> bool {
        matches!(self, Self::V0 | Self::V1)
    }

    pub fn proxy_eligible(&self) -> bool {
        matches!(self, Self::V2)
    }

    /// Report source: V2 reads contract state after its Distribution event,
    /// older versions replay Assessment logs.
    pub fn replays_assessment_logs(&self) -> bool {
        !matches!(self, Self::V2)
    }

    /// Filter for past Assessment logs of the event at `event_url`.
    ///
    /// V0 has no indexed topic for the event, every log is fetched and matched
    /// client-side with [`ContractVersion::matches_log`].
    pub fn assessment_filter(&self, event_url: &str) -> Option<LogFilter> {
        match self {
            Self::V0 => Some(LogFilter::Unfiltered),
            Self::V1 => Some(LogFilter::EventTopic(event_topic(event_url))),
            Self::V2 => None,
        }
    }

    /// Decide whether a replayed log belongs to the event.
    pub fn matches_log(
        &self,
        log_topic: Option<&str>,
        log_attendees: &[Address],
        event_url: &str,
        roster: &[Address],
    ) -> bool {
        match self {
            Self::V0 => same_identities(log_attendees, roster),
            Self::V1 => log_topic == Some(event_topic(event_url).as_str()),
            Self::V2 => false,
        }
    }
}

impl TryFrom<u8> for ContractVersion {
    type Error = TypesError;

    fn try_from(v: u8) -> Result<Self> {
        Self::from_u8(v)
    }
}

impl From<ContractVersion> for u8 {
    fn from(v: ContractVersion) -> Self {
        v.as_u8()
    }
}

/// keccak-256 of the event url, hex encoded with `0x` prefix.
pub fn event_topic(event_url: &str) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(event_url.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn same_identities(a: &[Address], b: &[Address]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&Address> = a.iter().collect();
    let mut b: Vec<&Address> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic_is_keccak() {
        // keccak256("") is a well known constant
        assert_eq!(
            event_topic(""),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_version_capabilities() {
        assert!(ContractVersion::V0.recovers_prior_assessment());
        assert!(ContractVersion::V1.recovers_prior_assessment());
        assert!(!ContractVersion::V2.recovers_prior_assessment());
        assert!(ContractVersion::V2.proxy_eligible());
        assert!(!ContractVersion::V1.proxy_eligible());
        assert_eq!(ContractVersion::V2.assessment_filter("x"), None);
        assert_eq!(
            ContractVersion::V0.assessment_filter("x"),
            Some(LogFilter::Unfiltered)
        );
    }

    #[test]
    fn test_v0_matches_by_identity_set() {
        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);
        let c = Address::from_bytes([3; 20]);
        let v = ContractVersion::V0;
        assert!(v.matches_log(None, &[b.clone(), a.clone()], "e", &[a.clone(), b.clone()]));
        assert!(!v.matches_log(None, &[a.clone(), c], "e", &[a, b]));
    }
}
