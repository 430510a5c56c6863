//! Deposit address pool
//!
//! Allocation prefers a rested, zero-balance address over provisioning a new
//! one. An address released by a terminal channel only becomes reusable after
//! the asset's cooldown elapses, and never while it still holds a balance:
//! a late payment to an old address must stay attributable, and reuse must
//! wait for chain finality.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onramp_core::{ChannelId, CryptoType, Decimal, EngineError, Result};

use crate::model::PaymentChannel;
use crate::store::{AddressRecord, AddressStats, AddressStore};

/// External collaborator that derives or requests fresh addresses
#[async_trait]
pub trait AddressProvisioner: Send + Sync {
    /// Provision a brand-new address on the given chain
    async fn provision(&self, crypto_type: CryptoType) -> Result<String>;
}

/// Address pool manager
pub struct AddressPool {
    store: Arc<dyn AddressStore>,
    provisioner: Arc<dyn AddressProvisioner>,
}

impl AddressPool {
    /// Create a pool over a store and a provisioner
    pub fn new(store: Arc<dyn AddressStore>, provisioner: Arc<dyn AddressProvisioner>) -> Self {
        Self { store, provisioner }
    }

    /// Allocate an address for a new channel.
    ///
    /// Returns a reusable address when one has rested past its cooldown with
    /// a zero balance; otherwise provisions a new one. Fails closed: a
    /// provisioning failure is an error, never a duplicate in-flight address.
    pub async fn allocate(
        &self,
        crypto_type: CryptoType,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<AddressRecord> {
        if let Some(record) = self
            .store
            .claim_reusable(crypto_type, channel_id, now)
            .await?
        {
            tracing::debug!(address = %record.address, %channel_id, "reissued pooled address");
            return Ok(record);
        }

        let address = self
            .provisioner
            .provision(crypto_type)
            .await
            .map_err(|e| EngineError::external(format!("address provisioning failed: {e}")))?;
        let record = AddressRecord {
            address,
            crypto_type,
            channel_id: Some(channel_id),
            reusable_after: None,
            balance: Decimal::ZERO,
            created_at: now,
        };
        self.store.insert(record.clone()).await?;
        tracing::debug!(address = %record.address, %channel_id, "provisioned new address");
        Ok(record)
    }

    /// Release a terminal channel's address back toward the pool.
    ///
    /// Unbinds the address. A zero-balance address starts its cooldown; an
    /// address with residual balance stays ineligible until swept.
    pub async fn release(&self, channel: &PaymentChannel, now: DateTime<Utc>) -> Result<()> {
        let Some(mut record) = self.store.get(&channel.payment_address).await? else {
            return Ok(());
        };
        if record.channel_id != Some(channel.channel_id) {
            return Ok(());
        }
        record.channel_id = None;
        record.reusable_after = if record.balance.is_zero() {
            Some(now + record.crypto_type.spec().reuse_cooldown())
        } else {
            None
        };
        self.store.put(record).await
    }

    /// Operator request to mark a released address reusable.
    ///
    /// Only valid once the bound channel is terminal (the address is
    /// unbound) and the observed balance is zero.
    pub async fn mark_reusable(&self, address: &str, now: DateTime<Utc>) -> Result<()> {
        let mut record = self
            .store
            .get(address)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("address {address}")))?;
        if record.channel_id.is_some() {
            return Err(EngineError::conflict(format!(
                "address {address} is still bound to a live channel"
            )));
        }
        if !record.balance.is_zero() {
            return Err(EngineError::conflict(format!(
                "address {address} holds a balance and must be swept first"
            )));
        }
        if record.reusable_after.is_none() {
            record.reusable_after = Some(now + record.crypto_type.spec().reuse_cooldown());
            self.store.put(record).await?;
        }
        Ok(())
    }

    /// Record a freshly observed on-chain balance.
    ///
    /// A nonzero balance revokes any pending reuse eligibility until the
    /// address is swept.
    pub async fn record_balance(&self, address: &str, balance: Decimal) -> Result<()> {
        let mut record = self
            .store
            .get(address)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("address {address}")))?;
        record.balance = balance;
        if !balance.is_zero() {
            record.reusable_after = None;
        }
        self.store.put(record).await
    }

    /// Pool statistics for the console
    pub async fn stats(&self, crypto_type: CryptoType, now: DateTime<Utc>) -> Result<AddressStats> {
        self.store.stats(crypto_type, now).await
    }

    /// Addresses whose residual balance may be consolidated: unbound, with a
    /// nonzero observed balance. A bound address may be mid-payment and is
    /// never sweepable.
    pub async fn sweepable(&self, crypto_type: CryptoType) -> Result<Vec<AddressRecord>> {
        let records = self.store.with_balance(crypto_type).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.channel_id.is_none())
            .collect())
    }
}
