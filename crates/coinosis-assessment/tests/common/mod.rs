#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coinosis_assessment::{
    AssessmentBackend, AssessmentContract, AssessmentError, AssessmentLog, AssessmentSession,
    ClapBeacon, ClapMessage, Collaborators, DistributionInfo, DistributionLog, EventRef,
    GasQuote, LifecycleEvent, MessageSigner, RelayRequest, Result, SendOptions,
    SessionOwner, SettlementRouter, SubmissionConfig, TransferLog, TxEvent, TxEvents,
};
use coinosis_types::{Address, Attendee, ContractVersion, LogFilter, TxHash};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const EVENT_URL: &str = "ethdenver-retro";

pub fn addr(n: u8) -> Address {
    Address::from_bytes([n; 20])
}

pub fn tx(n: u8) -> TxHash {
    TxHash::from_bytes([n; 32])
}

pub fn receipt(n: u8, block_number: u64) -> TxEvent {
    TxEvent::Receipt(coinosis_assessment::TxReceipt {
        transaction_hash: tx(n),
        block_hash: format!("0x{:064x}", block_number),
        block_number,
    })
}

pub struct MockContract {
    pub address: Address,
    pub version: ContractVersion,
    pub proxy_flag: u64,
    pub proxy_calls: AtomicUsize,
    pub clap_script: Mutex<Vec<TxEvent>>,
    pub clap_calls: Mutex<Vec<(Vec<Address>, Vec<i64>, SendOptions)>>,
    pub distribute_script: Mutex<Vec<TxEvent>>,
    pub distribute_calls: Mutex<Vec<SendOptions>>,
    pub fee: u128,
    pub attendees: Vec<Address>,
    pub claps: HashMap<Address, u64>,
    pub transfers: Vec<TransferLog>,
    pub assessment_logs: Vec<AssessmentLog>,
    pub filters: Mutex<Vec<LogFilter>>,
    pub distribution: Option<DistributionLog>,
    /// Number of block-hash lookups answered with `None` before the hash shows up
    pub unmined_polls: usize,
    pub block_polls: AtomicUsize,
}

impl MockContract {
    pub fn new(version: ContractVersion) -> Self {
        Self {
            address: addr(0xcc),
            version,
            proxy_flag: 0,
            proxy_calls: AtomicUsize::new(0),
            clap_script: Mutex::new(Vec::new()),
            clap_calls: Mutex::new(Vec::new()),
            distribute_script: Mutex::new(Vec::new()),
            distribute_calls: Mutex::new(Vec::new()),
            fee: 0,
            attendees: Vec::new(),
            claps: HashMap::new(),
            transfers: Vec::new(),
            assessment_logs: Vec::new(),
            filters: Mutex::new(Vec::new()),
            distribution: None,
            unmined_polls: 0,
            block_polls: AtomicUsize::new(0),
        }
    }

    pub fn script_clap(&self, events: Vec<TxEvent>) {
        *self.clap_script.lock().unwrap() = events;
    }

    pub fn script_distribute(&self, events: Vec<TxEvent>) {
        *self.distribute_script.lock().unwrap() = events;
    }

    pub fn polls(&self) -> usize {
        self.block_polls.load(Ordering::SeqCst)
    }

    pub fn proxy_lookups(&self) -> usize {
        self.proxy_calls.load(Ordering::SeqCst)
    }
}

fn stream(events: Vec<TxEvent>) -> TxEvents {
    let (tx, rx) = mpsc::unbounded_channel();
    for event in events {
        let _ = tx.send(event);
    }
    rx
}

#[async_trait]
impl AssessmentContract for MockContract {
    fn address(&self) -> &Address {
        &self.address
    }

    fn version(&self) -> ContractVersion {
        self.version
    }

    async fn proxy(&self, _account: &Address) -> Result<u64> {
        self.proxy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.proxy_flag)
    }

    async fn clap(
        &self,
        addresses: &[Address],
        claps: &[i64],
        options: SendOptions,
    ) -> Result<TxEvents> {
        self.clap_calls
            .lock()
            .unwrap()
            .push((addresses.to_vec(), claps.to_vec(), options));
        Ok(stream(self.clap_script.lock().unwrap().clone()))
    }

    async fn distribute(&self, options: SendOptions) -> Result<TxEvents> {
        self.distribute_calls.lock().unwrap().push(options);
        Ok(stream(self.distribute_script.lock().unwrap().clone()))
    }

    async fn fee(&self) -> Result<u128> {
        Ok(self.fee)
    }

    async fn total_claps(&self) -> Result<u64> {
        Ok(self.claps.values().sum())
    }

    async fn claps(&self, account: &Address) -> Result<u64> {
        Ok(self.claps.get(account).copied().unwrap_or(0))
    }

    async fn attendees(&self) -> Result<Vec<Address>> {
        Ok(self.attendees.clone())
    }

    async fn past_transfers(&self, from_block: u64) -> Result<Vec<TransferLog>> {
        Ok(self
            .transfers
            .iter()
            .filter(|t| t.block_number >= from_block)
            .cloned()
            .collect())
    }

    async fn past_assessments(&self, filter: &LogFilter) -> Result<Vec<AssessmentLog>> {
        self.filters.lock().unwrap().push(filter.clone());
        Ok(match filter {
            LogFilter::Unfiltered => self.assessment_logs.clone(),
            LogFilter::EventTopic(topic) => self
                .assessment_logs
                .iter()
                .filter(|log| log.topic.as_deref() == Some(topic.as_str()))
                .cloned()
                .collect(),
        })
    }

    async fn distribution_event(&self) -> Result<DistributionLog> {
        self.distribution
            .clone()
            .ok_or_else(|| AssessmentError::Transport("no distribution yet".to_string()))
    }

    async fn transaction_block_hash(&self, _hash: &TxHash) -> Result<Option<String>> {
        let seen = self.block_polls.fetch_add(1, Ordering::SeqCst);
        if seen < self.unmined_polls {
            Ok(None)
        } else {
            Ok(Some(format!("0x{:064x}", seen)))
        }
    }
}

#[derive(Default)]
pub struct MockBackend {
    pub assessments: Mutex<HashMap<(String, Address), BTreeMap<Address, i64>>>,
    pub fail_fetch: bool,
    pub relay_result: Option<TxHash>,
    pub relayed: Mutex<Vec<RelayRequest>>,
    pub eth_price: Option<f64>,
}

impl MockBackend {
    pub fn with_assessment(self, account: &Address, assessment: BTreeMap<Address, i64>) -> Self {
        self.assessments
            .lock()
            .unwrap()
            .insert((EVENT_URL.to_string(), account.clone()), assessment);
        self
    }
}

#[async_trait]
impl AssessmentBackend for MockBackend {
    async fn fetch_assessment(
        &self,
        event: &str,
        account: &Address,
    ) -> Result<Option<BTreeMap<Address, i64>>> {
        if self.fail_fetch {
            return Err(AssessmentError::Transport("502 Bad Gateway".to_string()));
        }
        Ok(self
            .assessments
            .lock()
            .unwrap()
            .get(&(event.to_string(), account.clone()))
            .cloned())
    }

    async fn relay_assessment(&self, request: &RelayRequest) -> Result<TxHash> {
        self.relayed.lock().unwrap().push(request.clone());
        self.relay_result
            .clone()
            .ok_or_else(|| AssessmentError::Transport("relay rejected".to_string()))
    }

    async fn gas_quote(&self) -> Result<GasQuote> {
        Ok(GasQuote {
            safe: 10.0,
            propose: 12.5,
        })
    }

    async fn distribution(&self, _event: &str) -> Result<DistributionInfo> {
        self.eth_price
            .map(|eth_price| DistributionInfo { eth_price })
            .ok_or_else(|| AssessmentError::Transport("price feed down".to_string()))
    }
}

#[derive(Default)]
pub struct MockBeacon {
    pub messages: Mutex<Vec<ClapMessage>>,
}

impl MockBeacon {
    pub fn deltas(&self) -> Vec<(Address, i64)> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| (m.clapee.clone(), m.delta))
            .collect()
    }

    /// Wait until `count` messages were dispatched.
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..200 {
            if self.messages.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} mirrored deltas, got {}",
            count,
            self.messages.lock().unwrap().len()
        );
    }
}

impl ClapBeacon for MockBeacon {
    fn dispatch(&self, message: ClapMessage) -> bool {
        self.messages.lock().unwrap().push(message);
        true
    }
}

pub struct MockSigner {
    pub account: Address,
}

#[async_trait]
impl MessageSigner for MockSigner {
    fn account(&self) -> &Address {
        &self.account
    }

    async fn sign(&self, payload: &str) -> Result<String> {
        Ok(format!("sig({})", payload.len()))
    }
}

pub fn event_ref(version: ContractVersion, organizer: Address, end: DateTime<Utc>) -> EventRef {
    EventRef {
        url: EVENT_URL.to_string(),
        contract: addr(0xcc),
        version,
        organizer,
        end,
    }
}

pub struct Harness {
    pub owner: SessionOwner,
    pub session: AssessmentSession,
    pub events: mpsc::UnboundedReceiver<LifecycleEvent>,
    pub contract: Arc<MockContract>,
    pub backend: Arc<MockBackend>,
    pub beacon: Arc<MockBeacon>,
    pub router: Arc<SettlementRouter>,
}

/// Session of `addr(1)` with attendees `addr(1)..=addr(3)`.
pub async fn harness(contract: MockContract, backend: MockBackend) -> Harness {
    harness_with(contract, backend, addr(1), Utc::now() - chrono::Duration::hours(1)).await
}

pub async fn harness_with(
    contract: MockContract,
    backend: MockBackend,
    organizer: Address,
    end: DateTime<Utc>,
) -> Harness {
    let account = addr(1);
    let version = contract.version;
    let contract = Arc::new(contract);
    let backend = Arc::new(backend);
    let beacon = Arc::new(MockBeacon::default());
    let router = Arc::new(SettlementRouter::new());

    let (owner, view) = SessionOwner::new();
    owner.set_account(Some(account.clone()), Some("ada".to_string()));
    owner.set_event(Some(event_ref(version, organizer, end)));

    let collaborators = Collaborators {
        contract: contract.clone(),
        backend: backend.clone(),
        signer: Arc::new(MockSigner { account }),
        beacon: beacon.clone(),
        router: router.clone(),
    };
    let (session, events) =
        AssessmentSession::open(&view, collaborators, SubmissionConfig::default()).unwrap();
    session
        .load_roster(vec![
            Attendee::new(addr(1), "ada"),
            Attendee::new(addr(2), "grace"),
            Attendee::new(addr(3), "linus"),
        ])
        .await;

    Harness {
        owner,
        session,
        events,
        contract,
        backend,
        beacon,
        router,
    }
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
