//! In-memory channel store

use std::collections::HashMap;

use async_trait::async_trait;
use onramp_channel::{ChannelFilter, ChannelStore, PaymentChannel};
use onramp_core::{ChannelId, EngineError, Result};
use parking_lot::RwLock;

/// Channel rows behind one lock
#[derive(Default)]
pub struct MemoryChannelStore {
    rows: RwLock<HashMap<ChannelId, PaymentChannel>>,
}

impl MemoryChannelStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn insert(&self, channel: PaymentChannel) -> Result<()> {
        let mut rows = self.rows.write();
        if rows.contains_key(&channel.channel_id) {
            return Err(EngineError::conflict(format!(
                "channel {} already exists",
                channel.channel_id
            )));
        }
        rows.insert(channel.channel_id, channel);
        Ok(())
    }

    async fn get(&self, id: ChannelId) -> Result<Option<PaymentChannel>> {
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn put(&self, channel: PaymentChannel) -> Result<()> {
        let mut rows = self.rows.write();
        if !rows.contains_key(&channel.channel_id) {
            return Err(EngineError::not_found(format!(
                "channel {}",
                channel.channel_id
            )));
        }
        rows.insert(channel.channel_id, channel);
        Ok(())
    }

    async fn delete(&self, id: ChannelId) -> Result<bool> {
        Ok(self.rows.write().remove(&id).is_some())
    }

    async fn list(&self, filter: &ChannelFilter) -> Result<Vec<PaymentChannel>> {
        let rows = self.rows.read();
        let mut matched: Vec<PaymentChannel> =
            rows.values().filter(|c| filter.matches(c)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn find_open_by_address(
        &self,
        address: &str,
        memo: Option<&str>,
    ) -> Result<Option<PaymentChannel>> {
        let rows = self.rows.read();
        Ok(rows
            .values()
            .find(|c| {
                !c.status.is_terminal()
                    && c.payment_address == address
                    && (c.memo.is_none() || c.memo.as_deref() == memo)
            })
            .cloned())
    }
}
