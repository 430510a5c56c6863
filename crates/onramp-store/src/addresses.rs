//! In-memory address store
//!
//! `claim_reusable` binds under the write lock, so two concurrent
//! allocations can never receive the same address.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onramp_channel::{AddressRecord, AddressStats, AddressStore};
use onramp_core::{ChannelId, CryptoType, Decimal, EngineError, Result};
use parking_lot::RwLock;

/// Address rows behind one lock
#[derive(Default)]
pub struct MemoryAddressStore {
    rows: RwLock<HashMap<String, AddressRecord>>,
}

impl MemoryAddressStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn insert(&self, record: AddressRecord) -> Result<()> {
        let mut rows = self.rows.write();
        if rows.contains_key(&record.address) {
            return Err(EngineError::conflict(format!(
                "address {} already exists",
                record.address
            )));
        }
        rows.insert(record.address.clone(), record);
        Ok(())
    }

    async fn get(&self, address: &str) -> Result<Option<AddressRecord>> {
        Ok(self.rows.read().get(address).cloned())
    }

    async fn put(&self, record: AddressRecord) -> Result<()> {
        let mut rows = self.rows.write();
        if !rows.contains_key(&record.address) {
            return Err(EngineError::not_found(format!("address {}", record.address)));
        }
        rows.insert(record.address.clone(), record);
        Ok(())
    }

    async fn claim_reusable(
        &self,
        crypto_type: CryptoType,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Option<AddressRecord>> {
        let mut rows = self.rows.write();
        let candidate = rows
            .values()
            .find(|r| r.crypto_type == crypto_type && r.is_reusable(now))
            .map(|r| r.address.clone());
        let Some(address) = candidate else {
            return Ok(None);
        };
        let record = rows
            .get_mut(&address)
            .ok_or_else(|| EngineError::internal("claimed address vanished under the lock"))?;
        record.channel_id = Some(channel_id);
        record.reusable_after = None;
        Ok(Some(record.clone()))
    }

    async fn with_balance(&self, crypto_type: CryptoType) -> Result<Vec<AddressRecord>> {
        let rows = self.rows.read();
        let mut found: Vec<AddressRecord> = rows
            .values()
            .filter(|r| r.crypto_type == crypto_type && !r.balance.is_zero())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(found)
    }

    async fn stats(&self, crypto_type: CryptoType, now: DateTime<Utc>) -> Result<AddressStats> {
        let rows = self.rows.read();
        let mut stats = AddressStats {
            crypto_type,
            total: 0,
            bound: 0,
            reusable: 0,
            cooling_down: 0,
            with_balance: 0,
            total_balance: Decimal::ZERO,
        };
        for record in rows.values().filter(|r| r.crypto_type == crypto_type) {
            stats.total += 1;
            if record.channel_id.is_some() {
                stats.bound += 1;
            } else if record.is_reusable(now) {
                stats.reusable += 1;
            } else if record.reusable_after.map(|at| at > now).unwrap_or(false) {
                stats.cooling_down += 1;
            }
            if !record.balance.is_zero() {
                stats.with_balance += 1;
                stats.total_balance += record.balance;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str, reusable_after: Option<DateTime<Utc>>) -> AddressRecord {
        AddressRecord {
            address: address.into(),
            crypto_type: CryptoType::Btc,
            channel_id: None,
            reusable_after,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn claim_binds_atomically() {
        let store = MemoryAddressStore::new();
        let now = Utc::now();
        store
            .insert(record("bc1qa", Some(now - chrono::Duration::hours(1))))
            .await
            .unwrap();

        let first = ChannelId::new();
        let second = ChannelId::new();
        let a = store.claim_reusable(CryptoType::Btc, first, now).await.unwrap();
        let b = store.claim_reusable(CryptoType::Btc, second, now).await.unwrap();
        assert_eq!(a.unwrap().channel_id, Some(first));
        assert!(b.is_none(), "one rested address cannot serve two channels");
    }

    #[tokio::test]
    async fn cooldown_gates_claims() {
        let store = MemoryAddressStore::new();
        let now = Utc::now();
        store
            .insert(record("bc1qb", Some(now + chrono::Duration::seconds(1))))
            .await
            .unwrap();
        let claimed = store
            .claim_reusable(CryptoType::Btc, ChannelId::new(), now)
            .await
            .unwrap();
        assert!(claimed.is_none(), "address inside cooldown must not be issued");
    }
}
