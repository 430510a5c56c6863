//! Storage trait seams for channels and addresses
//!
//! The production deployment backs these with the relational store; tests
//! and the default service wiring use the in-memory implementations from
//! `onramp-store`. The two atomic operations the engine's invariants rest on
//! are documented on their methods.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onramp_core::{ChannelId, CryptoType, Decimal, Result};
use serde::{Deserialize, Serialize};

use crate::model::{ChannelFilter, PaymentChannel};

// =============================================================================
// Channels
// =============================================================================

/// Persistence for payment channel rows
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Insert a new channel; fails with `Conflict` if the id exists
    async fn insert(&self, channel: PaymentChannel) -> Result<()>;

    /// Load a channel by id
    async fn get(&self, id: ChannelId) -> Result<Option<PaymentChannel>>;

    /// Replace the full row; fails with `NotFound` if the id is absent
    async fn put(&self, channel: PaymentChannel) -> Result<()>;

    /// Delete the row; returns whether it existed
    async fn delete(&self, id: ChannelId) -> Result<bool>;

    /// List channels matching a filter, newest first
    async fn list(&self, filter: &ChannelFilter) -> Result<Vec<PaymentChannel>>;

    /// The non-terminal channel bound to a payment address, if any.
    ///
    /// For memo-based assets the address is shared and `memo` selects the
    /// channel; for the rest the address alone identifies it.
    async fn find_open_by_address(
        &self,
        address: &str,
        memo: Option<&str>,
    ) -> Result<Option<PaymentChannel>>;
}

// =============================================================================
// Addresses
// =============================================================================

/// A blockchain address owned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// The address string
    pub address: String,
    /// Chain the address lives on
    pub crypto_type: CryptoType,
    /// Channel the address is currently issued to, if any
    pub channel_id: Option<ChannelId>,
    /// Instant after which the address may be reissued; `None` until its
    /// last channel went terminal with a zero balance
    pub reusable_after: Option<DateTime<Utc>>,
    /// Balance as last observed on-chain
    pub balance: Decimal,
    /// When the address was provisioned
    pub created_at: DateTime<Utc>,
}

impl AddressRecord {
    /// Whether the address may be issued to a new channel at `now`
    pub fn is_reusable(&self, now: DateTime<Utc>) -> bool {
        self.channel_id.is_none()
            && self.balance.is_zero()
            && self.reusable_after.map(|at| at <= now).unwrap_or(false)
    }
}

/// Per-asset address pool statistics for the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressStats {
    /// Asset these counts cover
    pub crypto_type: CryptoType,
    /// Addresses known to the pool
    pub total: usize,
    /// Addresses currently issued to a channel
    pub bound: usize,
    /// Addresses eligible for reuse right now
    pub reusable: usize,
    /// Released addresses still inside their cooldown window
    pub cooling_down: usize,
    /// Addresses holding a residual balance awaiting consolidation
    pub with_balance: usize,
    /// Sum of residual balances
    pub total_balance: Decimal,
}

/// Persistence for the address pool
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Insert a newly provisioned address; fails with `Conflict` on reuse of
    /// the address string
    async fn insert(&self, record: AddressRecord) -> Result<()>;

    /// Load one address
    async fn get(&self, address: &str) -> Result<Option<AddressRecord>>;

    /// Replace the full record
    async fn put(&self, record: AddressRecord) -> Result<()>;

    /// Atomically claim a reusable address for a new channel: picks an
    /// unbound, zero-balance address whose cooldown has elapsed, binds it to
    /// `channel_id`, and returns it. Two concurrent calls never receive the
    /// same address.
    async fn claim_reusable(
        &self,
        crypto_type: CryptoType,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Option<AddressRecord>>;

    /// Addresses of one asset holding a nonzero observed balance
    async fn with_balance(&self, crypto_type: CryptoType) -> Result<Vec<AddressRecord>>;

    /// Pool statistics for one asset at `now`
    async fn stats(&self, crypto_type: CryptoType, now: DateTime<Utc>) -> Result<AddressStats>;
}
