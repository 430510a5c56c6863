//! Deposit events and the monitor source contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onramp_core::{CryptoType, Decimal, Result, TxHash};
use serde::{Deserialize, Serialize};

/// One deposit observation from the blockchain monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEvent {
    /// Address the deposit arrived at
    pub address: String,
    /// Asset of the deposit
    pub crypto_type: CryptoType,
    /// Deposit transaction hash
    pub tx_hash: TxHash,
    /// Deposited amount
    pub amount: Decimal,
    /// Confirmation count at observation time; non-decreasing per tx
    pub confirmations: u32,
    /// Memo attached to the deposit, for memo-based assets
    pub memo: Option<String>,
    /// When the monitor saw the deposit
    pub detected_at: DateTime<Utc>,
}

/// Health snapshot of the monitor collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorHealth {
    /// Whether the feed is currently delivering
    pub connected: bool,
    /// Addresses under watch
    pub watched_addresses: usize,
    /// Last event instant, if any event arrived yet
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Push or poll source of deposit observations.
///
/// Delivery is at-least-once; duplicates and out-of-order events are the
/// consumer's problem. `next_event` returning `None` means the feed ended.
#[async_trait]
pub trait DepositSource: Send + Sync {
    /// Await the next observation
    async fn next_event(&self) -> Result<Option<DepositEvent>>;

    /// Current feed health
    async fn health(&self) -> Result<MonitorHealth>;
}
