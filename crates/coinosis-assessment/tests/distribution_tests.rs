mod common;

use chrono::Utc;
use common::*;
use coinosis_assessment::{AssessmentError, DistributionConfig, TxEvent};
use coinosis_types::{ContractVersion, TransactionState};
use std::time::Duration;
use tokio::sync::mpsc;

fn ended_an_hour_ago() -> chrono::DateTime<Utc> {
    Utc::now() - chrono::Duration::hours(1)
}

#[tokio::test]
async fn test_organizer_distributes_rewards() {
    let contract = MockContract::new(ContractVersion::V2);
    contract.script_distribute(vec![TxEvent::TransactionHash(tx(5)), receipt(5, 120)]);
    let h = harness_with(contract, MockBackend::default(), addr(1), ended_an_hour_ago()).await;

    let (notify, mut notices) = mpsc::unbounded_channel();
    let trigger = h
        .session
        .distribution_trigger(notify, DistributionConfig::default());

    let hash = trigger.distribute().await.unwrap();
    assert_eq!(hash, tx(5));
    assert_eq!(h.session.state().await, TransactionState::Rewarded);
    assert!(trigger.record().await.unwrap().confirmed);

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.transaction_hash, tx(5));
    assert_eq!(notice.block_number, 120);

    let calls = h.contract.distribute_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    // 12.5 gwei proposed by the gas quote
    assert_eq!(calls[0].gas_price, 12_500_000_000);
    assert_eq!(calls[0].from, addr(1));
}

#[tokio::test]
async fn test_distribution_failure_restores_previous_state() {
    let contract = MockContract::new(ContractVersion::V1);
    contract.script_clap(vec![TxEvent::TransactionHash(tx(7)), receipt(7, 42)]);
    contract.script_distribute(vec![
        TxEvent::TransactionHash(tx(5)),
        TxEvent::Error("out of gas".to_string()),
    ]);
    let h = harness_with(contract, MockBackend::default(), addr(1), ended_an_hour_ago()).await;
    h.session.send().await.unwrap();
    assert_eq!(h.session.state().await, TransactionState::Clapped);

    let (notify, mut notices) = mpsc::unbounded_channel();
    let trigger = h
        .session
        .distribution_trigger(notify, DistributionConfig::default());

    assert!(trigger.distribute().await.is_err());
    assert_eq!(h.session.state().await, TransactionState::Clapped);
    assert!(trigger.record().await.is_none());
    assert!(trigger.last_error().await.unwrap().contains("out of gas"));
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_only_organizer_may_distribute() {
    let h = harness_with(
        MockContract::new(ContractVersion::V2),
        MockBackend::default(),
        addr(3),
        ended_an_hour_ago(),
    )
    .await;
    let (notify, _notices) = mpsc::unbounded_channel();
    let trigger = h
        .session
        .distribution_trigger(notify, DistributionConfig::default());

    let err = trigger.distribute().await.unwrap_err();
    assert!(matches!(err, AssessmentError::NotOrganizer(_)));
    assert_eq!(h.session.state().await, TransactionState::Registered);
    assert!(h.contract.distribute_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_gate_closed_during_commitment_window() {
    let h = harness_with(
        MockContract::new(ContractVersion::V2),
        MockBackend::default(),
        addr(1),
        Utc::now() - chrono::Duration::minutes(2),
    )
    .await;
    let (notify, _notices) = mpsc::unbounded_channel();
    let trigger = h
        .session
        .distribution_trigger(notify, DistributionConfig::default());

    assert!(!trigger.gate().is_open(Utc::now()));
    let err = trigger.distribute().await.unwrap_err();
    assert!(matches!(err, AssessmentError::GateClosed(_)));
    assert_eq!(h.session.state().await, TransactionState::Registered);
}

#[tokio::test]
async fn test_gate_watcher_publishes_opening() {
    let h = harness_with(
        MockContract::new(ContractVersion::V2),
        MockBackend::default(),
        addr(1),
        Utc::now(),
    )
    .await;
    let (notify, _notices) = mpsc::unbounded_channel();
    let config = DistributionConfig {
        commitment_window: Duration::from_millis(50),
        gate_poll_interval: Duration::from_millis(20),
        gas_limit: None,
    };
    let trigger = h.session.distribution_trigger(notify, config);

    let (task, mut open) = trigger.watch_gate();
    tokio::time::timeout(Duration::from_secs(2), open.wait_for(|o| *o))
        .await
        .unwrap()
        .unwrap();
    task.join().await;
}

#[tokio::test]
async fn test_observed_distribution_rewards_attendee() {
    let h = harness(MockContract::new(ContractVersion::V2), MockBackend::default()).await;
    let state = h.session.observe_distribution().await.unwrap();
    assert_eq!(state, TransactionState::Rewarded);
    // observing twice keeps the terminal state
    let state = h.session.observe_distribution().await.unwrap();
    assert_eq!(state, TransactionState::Rewarded);
}
