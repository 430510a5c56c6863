//! Monitor ingestion worker integration tests

mod support;

use std::sync::Arc;
use std::time::Duration;

use onramp_channel::{ChannelStatus, OpenChannelRequest, PriceQuote};
use onramp_core::{ChannelId, CryptoType, EngineConfig};
use onramp_monitor::ScriptedSource;
use onramp_service::{EngineDeps, EngineService};
use rust_decimal_macros::dec;
use support::{collaborators, deposit};

fn btc_request() -> OpenChannelRequest {
    OpenChannelRequest {
        username: "watcheduser".into(),
        crypto_type: CryptoType::Btc,
        amount_crypto: dec!(0.001),
        quote: PriceQuote {
            usd_per_unit: dec!(50000),
        },
        public_keys: None,
    }
}

async fn wait_for_status(
    service: &EngineService,
    id: ChannelId,
    status: ChannelStatus,
) -> ChannelStatus {
    for _ in 0..200 {
        let current = service.channel(id).await.unwrap().status;
        if current == status {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    service.channel(id).await.unwrap().status
}

#[tokio::test]
async fn scripted_feed_confirms_a_channel_through_the_worker() {
    let (provisioner, chain, _) = collaborators();
    // The provisioner is deterministic: the first channel gets "addr0".
    let script = ScriptedSource::new([
        deposit(CryptoType::Btc, "addr0", "tx1", dec!(0.001), 1),
        // Redelivered with more confirmations, per the at-least-once feed.
        deposit(CryptoType::Btc, "addr0", "tx1", dec!(0.001), 2),
        deposit(CryptoType::Btc, "addr0", "tx1", dec!(0.001), 2),
        // Noise at an address the pool never issued.
        deposit(CryptoType::Btc, "unknown", "tx9", dec!(1), 6),
    ]);
    let deps = EngineDeps::in_memory(provisioner, chain, Arc::new(script), 0, 0);
    let addresses = Arc::clone(&deps.addresses);
    let service = EngineService::new(EngineConfig::default(), deps);

    let channel = service.open_channel(btc_request()).await.unwrap();
    assert_eq!(channel.payment_address, "addr0");

    let handles = service.spawn_workers();
    let status = wait_for_status(&service, channel.channel_id, ChannelStatus::Confirmed).await;
    assert_eq!(status, ChannelStatus::Confirmed);

    // The script is drained, so the ingestor loop has ended on its own.
    tokio::time::timeout(Duration::from_secs(2), handles.ingestor)
        .await
        .unwrap()
        .unwrap();

    let recent = service.recent_detections();
    assert_eq!(recent.len(), 4, "every observation lands in the ring");

    // The observed funds are tracked on the address for later consolidation.
    let record = addresses.get("addr0").await.unwrap().unwrap();
    assert_eq!(record.balance, dec!(0.001));

    service.shutdown();
    tokio::time::timeout(Duration::from_secs(2), handles.sweeper)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn health_reflects_a_drained_feed() {
    let (provisioner, chain, _) = collaborators();
    let script = ScriptedSource::new([deposit(CryptoType::Btc, "addr0", "tx1", dec!(0.001), 2)]);
    let deps = EngineDeps::in_memory(provisioner, chain, Arc::new(script), 0, 0);
    let service = EngineService::new(EngineConfig::default(), deps);

    assert!(service.monitor_health().await.unwrap().connected);
    let channel = service.open_channel(btc_request()).await.unwrap();

    let handles = service.spawn_workers();
    wait_for_status(&service, channel.channel_id, ChannelStatus::Confirmed).await;
    tokio::time::timeout(Duration::from_secs(2), handles.ingestor)
        .await
        .unwrap()
        .unwrap();

    let health = service.monitor_health().await.unwrap();
    assert!(!health.connected);
    assert!(health.last_event_at.is_some());

    service.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(2), handles.sweeper).await;
}
