//! Account creation resolver integration tests

mod support;

use std::sync::Arc;

use assert_matches::assert_matches;
use onramp_channel::{ChannelStatus, CreationMethod, OpenChannelRequest, PriceQuote};
use onramp_core::{CryptoType, EngineConfig, EngineError, PublicKeySet, TxHash};
use onramp_service::{EngineDeps, EngineService};
use rust_decimal_macros::dec;
use support::{collaborators, deposit};

fn keys() -> PublicKeySet {
    let key = format!("STM{}", "7".repeat(50));
    PublicKeySet {
        owner: key.clone(),
        active: key.clone(),
        posting: key.clone(),
        memo: key,
    }
}

fn request(username: &str) -> OpenChannelRequest {
    OpenChannelRequest {
        username: username.into(),
        crypto_type: CryptoType::Btc,
        amount_crypto: dec!(0.001),
        quote: PriceQuote {
            usd_per_unit: dec!(50000),
        },
        public_keys: Some(keys()),
    }
}

fn deps_with_ledger(act_balance: u64, rc_mana: u64) -> EngineDeps {
    let (provisioner, chain, source) = collaborators();
    EngineDeps::in_memory(provisioner, chain, source, act_balance, rc_mana)
}

fn service_with_ledger(act_balance: u64, rc_mana: u64) -> EngineService {
    EngineService::new(EngineConfig::default(), deps_with_ledger(act_balance, rc_mana))
}

async fn confirmed_channel(service: &EngineService, username: &str) -> onramp_core::ChannelId {
    let channel = service.open_channel(request(username)).await.unwrap();
    service
        .ingest_deposit(deposit(
            CryptoType::Btc,
            &channel.payment_address,
            &format!("tx-{username}"),
            dec!(0.001),
            2,
        ))
        .await;
    channel.channel_id
}

#[tokio::test]
async fn last_act_goes_to_first_resolver_then_delegation() {
    let service = service_with_ledger(1, 100_000_000_000);
    let first = confirmed_channel(&service, "firstuser").await;
    let second = confirmed_channel(&service, "seconduser").await;

    let op1 = service.resolve_creation(first).await.unwrap();
    assert_eq!(op1.method, CreationMethod::Act);
    assert_eq!(service.ledger_status().await.unwrap().act_balance, 0);

    let op2 = service.resolve_creation(second).await.unwrap();
    assert_eq!(op2.method, CreationMethod::Delegation);
    assert_eq!(op2.creation_fee, EngineConfig::default().delegation_amount);
}

#[tokio::test]
async fn zero_act_always_resolves_to_delegation() {
    let service = service_with_ledger(0, 100_000_000_000);
    let id = confirmed_channel(&service, "deluser").await;
    let op = service.resolve_creation(id).await.unwrap();
    assert_eq!(op.method, CreationMethod::Delegation);
}

#[tokio::test]
async fn repeated_resolve_consumes_one_act() {
    let service = service_with_ledger(1, 100_000_000_000);
    let id = confirmed_channel(&service, "retryuser").await;

    let op1 = service.resolve_creation(id).await.unwrap();
    let op2 = service.resolve_creation(id).await.unwrap();
    assert_eq!(op1, op2);
    assert_eq!(service.ledger_status().await.unwrap().act_balance, 0);
}

#[tokio::test]
async fn exhausted_funding_fails_the_channel() {
    let service = service_with_ledger(0, 0);
    let id = confirmed_channel(&service, "pooruser").await;

    let err = service.resolve_creation(id).await.unwrap_err();
    assert_matches!(err, EngineError::ResourceExhausted { .. });

    let channel = service.channel(id).await.unwrap();
    assert_eq!(channel.status, ChannelStatus::Failed);
    assert!(channel.failure_reason.is_some());
}

#[tokio::test]
async fn complete_drives_channel_to_completed() {
    let service = service_with_ledger(1, 100_000_000_000);
    let id = confirmed_channel(&service, "doneuser").await;

    service.resolve_creation(id).await.unwrap();
    service
        .complete_creation(id, TxHash::from("create-tx"), CreationMethod::Act)
        .await
        .unwrap();

    let channel = service.channel(id).await.unwrap();
    assert_eq!(channel.status, ChannelStatus::Completed);
    let creation = channel.creation.clone().unwrap();
    assert_eq!(creation.act_used, 1);
    assert_eq!(creation.creation_tx, TxHash::from("create-tx"));
    assert!(channel.completed_at.is_some());
    assert!(channel.processing_time_seconds().is_some());
}

#[tokio::test]
async fn resolve_without_keys_is_a_validation_error() {
    let service = service_with_ledger(1, 100_000_000_000);
    let mut req = request("nokeyuser");
    req.public_keys = None;
    let channel = service.open_channel(req).await.unwrap();
    service
        .ingest_deposit(deposit(
            CryptoType::Btc,
            &channel.payment_address,
            "tx-nokey",
            dec!(0.001),
            2,
        ))
        .await;

    let err = service.resolve_creation(channel.channel_id).await.unwrap_err();
    assert_matches!(err, EngineError::Validation { .. });
}

#[tokio::test]
async fn resolve_on_pending_channel_conflicts() {
    let service = service_with_ledger(1, 100_000_000_000);
    let channel = service.open_channel(request("earlyuser")).await.unwrap();
    let err = service.resolve_creation(channel.channel_id).await.unwrap_err();
    assert_matches!(err, EngineError::Conflict { .. });
}

#[tokio::test]
async fn process_pending_covers_all_confirmed_channels() {
    let service = service_with_ledger(1, 100_000_000_000);
    let first = confirmed_channel(&service, "batchone").await;
    let second = confirmed_channel(&service, "batchtwo").await;

    let ops = service.process_pending_accounts().await.unwrap();
    assert_eq!(ops.len(), 2);
    let methods: Vec<CreationMethod> = ops.iter().map(|op| op.method).collect();
    assert!(methods.contains(&CreationMethod::Act));
    assert!(methods.contains(&CreationMethod::Delegation));
    let ids: Vec<_> = ops.iter().map(|op| op.channel_id).collect();
    assert!(ids.contains(&first) && ids.contains(&second));
}

#[tokio::test]
async fn claim_act_converts_rc() {
    let service = service_with_ledger(0, 20_000_000_000);
    let snapshot = service.claim_act().await.unwrap();
    assert_eq!(snapshot.act_balance, 1);
    assert_eq!(snapshot.rc_mana, 10_000_000_000);
}

#[tokio::test]
async fn claim_act_without_mana_is_exhausted() {
    let service = service_with_ledger(0, 1_000);
    let err = service.claim_act().await.unwrap_err();
    assert_matches!(err, EngineError::ResourceExhausted { .. });
}

#[tokio::test]
async fn resolve_survives_a_service_restart() {
    let deps = deps_with_ledger(2, 100_000_000_000);
    let first = EngineService::new(EngineConfig::default(), deps.clone());
    let id = confirmed_channel(&first, "restartuser").await;

    let op1 = first.resolve_creation(id).await.unwrap();
    assert_eq!(op1.method, CreationMethod::Act);
    drop(first);

    // A fresh instance over the same stores sees the recorded decision and
    // leaves the second ACT untouched.
    let second = EngineService::new(EngineConfig::default(), deps);
    let op2 = second.resolve_creation(id).await.unwrap();
    assert_eq!(op1, op2);
    assert_eq!(second.ledger_status().await.unwrap().act_balance, 1);
}

#[tokio::test]
async fn claim_act_respects_the_configured_floor() {
    let config = EngineConfig {
        act_claim_rc_cost: 50_000_000_000,
        ..EngineConfig::default()
    };
    // Mana covers the chain's claim cost but sits under the floor.
    let service = EngineService::new(config, deps_with_ledger(0, 20_000_000_000));

    let err = service.claim_act().await.unwrap_err();
    assert_matches!(err, EngineError::ResourceExhausted { .. });
    assert_eq!(service.ledger_status().await.unwrap().act_balance, 0);
}

#[tokio::test]
async fn concurrent_resolves_share_one_act() {
    let service = Arc::new(service_with_ledger(1, 100_000_000_000));
    let first = confirmed_channel(&service, "raceone").await;
    let second = confirmed_channel(&service, "racetwo").await;

    let (a, b) = tokio::join!(
        service.resolve_creation(first),
        service.resolve_creation(second)
    );
    let methods = [a.unwrap().method, b.unwrap().method];
    assert!(methods.contains(&CreationMethod::Act));
    assert!(methods.contains(&CreationMethod::Delegation));
    assert_eq!(service.ledger_status().await.unwrap().act_balance, 0);
}
