//! Channel state machine
//!
//! Owns every mutation of a [`PaymentChannel`] row. Transitions are
//! serialized per channel id through a keyed async lock, so a duplicated or
//! concurrent monitor notification can never race a channel through two
//! transitions at once. Every mutating call is idempotent keyed by the
//! channel id plus the triggering event identity.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use onramp_core::{
    ChannelId, Decimal, EngineConfig, EngineError, Result, TxHash,
};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::model::{
    ChannelFilter, ChannelStatus, CreationDecision, CreationRecord, OpenChannelRequest,
    PaymentChannel,
};
use crate::pool::AddressPool;
use crate::store::ChannelStore;

/// Channel lifecycle coordinator
pub struct ChannelMachine {
    store: Arc<dyn ChannelStore>,
    pool: Arc<AddressPool>,
    config: EngineConfig,
    /// Per-channel single-writer locks
    row_locks: Mutex<HashMap<ChannelId, Arc<AsyncMutex<()>>>>,
}

impl ChannelMachine {
    /// Create a machine over a channel store and address pool
    pub fn new(store: Arc<dyn ChannelStore>, pool: Arc<AddressPool>, config: EngineConfig) -> Self {
        Self {
            store,
            pool,
            config,
            row_locks: Mutex::new(HashMap::new()),
        }
    }

    fn row_lock(&self, id: ChannelId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.row_locks.lock();
        locks.entry(id).or_default().clone()
    }

    fn drop_row_lock(&self, id: ChannelId) {
        self.row_locks.lock().remove(&id);
    }

    #[cfg(test)]
    fn row_lock_entries(&self) -> usize {
        self.row_locks.lock().len()
    }

    async fn load(&self, id: ChannelId) -> Result<PaymentChannel> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("channel {id}")))
    }

    // =========================================================================
    // Open
    // =========================================================================

    /// Open a new channel: validate the request, issue an address, price the
    /// USD amount once, and persist the `pending` row.
    pub async fn open(&self, request: OpenChannelRequest) -> Result<PaymentChannel> {
        if request.username.trim().is_empty() {
            return Err(EngineError::validation("username must not be empty"));
        }
        if request.amount_crypto <= Decimal::ZERO {
            return Err(EngineError::validation("amount_crypto must be positive"));
        }
        if request.quote.usd_per_unit <= Decimal::ZERO {
            return Err(EngineError::validation("price quote must be positive"));
        }
        if let Some(keys) = &request.public_keys {
            keys.validate()?;
        }

        let channel_id = ChannelId::new();
        let now = Utc::now();
        let spec = request.crypto_type.spec();
        let address = self
            .pool
            .allocate(request.crypto_type, channel_id, now)
            .await?;
        // Memo-based assets share one service address; the memo carries the
        // channel identity.
        let memo = spec
            .memo_required
            .then(|| channel_id.uuid().simple().to_string());

        let channel = PaymentChannel {
            channel_id,
            username: request.username,
            crypto_type: request.crypto_type,
            payment_address: address.address,
            memo,
            amount_crypto: request.amount_crypto,
            amount_usd: request.amount_crypto * request.quote.usd_per_unit,
            status: ChannelStatus::Pending,
            public_keys: request.public_keys,
            tx_hash: None,
            failure_reason: None,
            creation_decision: None,
            creation: None,
            created_at: now,
            confirmed_at: None,
            completed_at: None,
        };
        self.store.insert(channel.clone()).await?;
        tracing::info!(
            %channel_id,
            asset = %channel.crypto_type,
            address = %channel.payment_address,
            usd = %channel.amount_usd,
            "channel opened"
        );
        Ok(channel)
    }

    // =========================================================================
    // Deposit detection
    // =========================================================================

    /// Apply a monitor deposit report.
    ///
    /// Idempotent on `(channel_id, tx_hash)`: redelivery after confirmation
    /// returns the current snapshot unchanged. Confirmation counts below the
    /// asset threshold record the detected hash without transitioning.
    pub async fn submit_deposit(
        &self,
        channel_id: ChannelId,
        tx_hash: TxHash,
        amount: Decimal,
        confirmations: u32,
    ) -> Result<PaymentChannel> {
        let lock = self.row_lock(channel_id);
        let _guard = lock.lock().await;

        let mut channel = self.load(channel_id).await?;
        match channel.status {
            ChannelStatus::Pending => {}
            // Redelivery of the confirming event, or monitor noise on a
            // settled channel. Absorbed either way.
            _ => {
                if channel.tx_hash.as_ref() != Some(&tx_hash) {
                    tracing::warn!(
                        %channel_id,
                        tx = %tx_hash,
                        status = channel.status.as_str(),
                        "deposit report for a settled channel ignored"
                    );
                }
                return Ok(channel);
            }
        }

        if channel.tx_hash.is_none() {
            channel.tx_hash = Some(tx_hash.clone());
        } else if channel.tx_hash.as_ref() != Some(&tx_hash) {
            tracing::warn!(
                %channel_id,
                tx = %tx_hash,
                "second transaction observed on a pending channel; keeping the first"
            );
            return Ok(channel);
        }

        if amount < channel.amount_crypto {
            tracing::warn!(
                %channel_id,
                expected = %channel.amount_crypto,
                received = %amount,
                "deposit amount below expectation"
            );
        }

        let threshold = channel.crypto_type.spec().min_confirmations;
        if confirmations < threshold {
            tracing::debug!(
                %channel_id,
                confirmations,
                threshold,
                "deposit detected, awaiting finality"
            );
            self.store.put(channel.clone()).await?;
            return Ok(channel);
        }

        channel.status = ChannelStatus::Confirmed;
        channel.confirmed_at = Some(Utc::now());
        self.store.put(channel.clone()).await?;
        tracing::info!(%channel_id, tx = %tx_hash, "deposit final, channel confirmed");
        Ok(channel)
    }

    // =========================================================================
    // Creation decision and completion
    // =========================================================================

    /// Persist the funding decision for a confirmed channel.
    ///
    /// The decision lives on the channel row so any service instance over
    /// the same store sees it; a repeated call returns the recorded
    /// decision without overwriting it.
    pub async fn record_creation_decision(
        &self,
        channel_id: ChannelId,
        decision: CreationDecision,
    ) -> Result<CreationDecision> {
        let lock = self.row_lock(channel_id);
        let _guard = lock.lock().await;

        let mut channel = self.load(channel_id).await?;
        if let Some(existing) = channel.creation_decision {
            return Ok(existing);
        }
        if channel.status != ChannelStatus::Confirmed {
            return Err(EngineError::conflict(format!(
                "channel {channel_id} is {}, not confirmed",
                channel.status.as_str()
            )));
        }
        channel.creation_decision = Some(decision.clone());
        self.store.put(channel).await?;
        Ok(decision)
    }

    /// Record that the target account now exists on-chain.
    pub async fn complete(
        &self,
        channel_id: ChannelId,
        creation: CreationRecord,
    ) -> Result<PaymentChannel> {
        let lock = self.row_lock(channel_id);
        let guard = lock.lock().await;

        let mut channel = self.load(channel_id).await?;
        if channel.status == ChannelStatus::Completed {
            // Retried completion report.
            drop(guard);
            self.drop_row_lock(channel_id);
            return Ok(channel);
        }
        if !channel.status.can_transition_to(ChannelStatus::Completed) {
            return Err(EngineError::conflict(format!(
                "channel {channel_id} is {} and cannot complete",
                channel.status.as_str()
            )));
        }
        channel.status = ChannelStatus::Completed;
        channel.completed_at = Some(Utc::now());
        channel.creation_decision = None;
        channel.creation = Some(creation);
        self.store.put(channel.clone()).await?;
        self.pool.release(&channel, Utc::now()).await?;
        tracing::info!(%channel_id, username = %channel.username, "channel completed");
        drop(guard);
        self.drop_row_lock(channel_id);
        Ok(channel)
    }

    /// Move a channel to `failed` with an operator-visible reason.
    pub async fn fail(
        &self,
        channel_id: ChannelId,
        reason: impl Into<String>,
    ) -> Result<PaymentChannel> {
        let lock = self.row_lock(channel_id);
        let guard = lock.lock().await;

        let mut channel = self.load(channel_id).await?;
        if channel.status == ChannelStatus::Failed {
            drop(guard);
            self.drop_row_lock(channel_id);
            return Ok(channel);
        }
        if !channel.status.can_transition_to(ChannelStatus::Failed) {
            return Err(EngineError::conflict(format!(
                "channel {channel_id} is {} and cannot fail",
                channel.status.as_str()
            )));
        }
        let reason = reason.into();
        channel.status = ChannelStatus::Failed;
        channel.failure_reason = Some(reason.clone());
        self.store.put(channel.clone()).await?;
        self.pool.release(&channel, Utc::now()).await?;
        tracing::warn!(%channel_id, %reason, "channel failed");
        drop(guard);
        self.drop_row_lock(channel_id);
        Ok(channel)
    }

    // =========================================================================
    // Admin cancel (deletion)
    // =========================================================================

    /// Delete a channel record.
    ///
    /// Available to an authorized operator from any status, terminal
    /// included; deletion is an operator prerogative, not a lifecycle
    /// transition. The bound address is released and still honors the
    /// zero-balance and cooldown gates before reuse.
    pub async fn cancel(&self, channel_id: ChannelId) -> Result<()> {
        let lock = self.row_lock(channel_id);
        {
            let _guard = lock.lock().await;
            let channel = self.load(channel_id).await?;
            self.pool.release(&channel, Utc::now()).await?;
            self.store.delete(channel_id).await?;
            tracing::info!(
                %channel_id,
                status = channel.status.as_str(),
                "channel cancelled by operator"
            );
        }
        self.drop_row_lock(channel_id);
        Ok(())
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Sweep `pending` channels whose TTL elapsed to `expired`.
    ///
    /// Driven by the periodic sweeper so channels expire without being
    /// queried. Returns the channels expired in this pass.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<PaymentChannel>> {
        let filter = ChannelFilter {
            status: Some(ChannelStatus::Pending),
            ..ChannelFilter::default()
        };
        let deadline = self.config.channel_ttl();
        let mut expired = Vec::new();
        for candidate in self.store.list(&filter).await? {
            if now - candidate.created_at < deadline {
                continue;
            }
            let lock = self.row_lock(candidate.channel_id);
            let guard = lock.lock().await;
            // Re-check under the lock; a deposit may have landed meanwhile.
            let Some(mut channel) = self.store.get(candidate.channel_id).await? else {
                continue;
            };
            if channel.status != ChannelStatus::Pending {
                continue;
            }
            channel.status = ChannelStatus::Expired;
            self.store.put(channel.clone()).await?;
            self.pool.release(&channel, now).await?;
            drop(guard);
            self.drop_row_lock(channel.channel_id);
            tracing::info!(channel_id = %channel.channel_id, "channel expired");
            expired.push(channel);
        }
        Ok(expired)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current snapshot of one channel
    pub async fn get(&self, channel_id: ChannelId) -> Result<PaymentChannel> {
        self.load(channel_id).await
    }

    /// List channels for the console, newest first
    pub async fn list(&self, mut filter: ChannelFilter) -> Result<Vec<PaymentChannel>> {
        let cap = self.config.max_channels_page;
        filter.limit = Some(filter.limit.map_or(cap, |l| l.min(cap)));
        self.store.list(&filter).await
    }

    /// Channels that are confirmed, carry keys, and still owe a creation
    pub async fn awaiting_creation(&self) -> Result<Vec<PaymentChannel>> {
        let filter = ChannelFilter {
            status: Some(ChannelStatus::Confirmed),
            ..ChannelFilter::default()
        };
        let channels = self.store.list(&filter).await?;
        Ok(channels.into_iter().filter(|c| c.awaiting_creation()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CreationMethod, OpenChannelRequest, PriceQuote};
    use crate::pool::AddressProvisioner;
    use crate::store::{AddressRecord, AddressStats, AddressStore};
    use async_trait::async_trait;
    use onramp_core::CryptoType;
    use parking_lot::RwLock;

    #[derive(Default)]
    struct MapChannels {
        rows: RwLock<HashMap<ChannelId, PaymentChannel>>,
    }

    #[async_trait]
    impl ChannelStore for MapChannels {
        async fn insert(&self, channel: PaymentChannel) -> Result<()> {
            self.rows.write().insert(channel.channel_id, channel);
            Ok(())
        }

        async fn get(&self, id: ChannelId) -> Result<Option<PaymentChannel>> {
            Ok(self.rows.read().get(&id).cloned())
        }

        async fn put(&self, channel: PaymentChannel) -> Result<()> {
            self.rows.write().insert(channel.channel_id, channel);
            Ok(())
        }

        async fn delete(&self, id: ChannelId) -> Result<bool> {
            Ok(self.rows.write().remove(&id).is_some())
        }

        async fn list(&self, filter: &ChannelFilter) -> Result<Vec<PaymentChannel>> {
            Ok(self
                .rows
                .read()
                .values()
                .filter(|c| filter.matches(c))
                .cloned()
                .collect())
        }

        async fn find_open_by_address(
            &self,
            address: &str,
            memo: Option<&str>,
        ) -> Result<Option<PaymentChannel>> {
            Ok(self
                .rows
                .read()
                .values()
                .find(|c| {
                    !c.status.is_terminal()
                        && c.payment_address == address
                        && (c.memo.is_none() || c.memo.as_deref() == memo)
                })
                .cloned())
        }
    }

    #[derive(Default)]
    struct MapAddresses {
        rows: RwLock<HashMap<String, AddressRecord>>,
    }

    #[async_trait]
    impl AddressStore for MapAddresses {
        async fn insert(&self, record: AddressRecord) -> Result<()> {
            self.rows.write().insert(record.address.clone(), record);
            Ok(())
        }

        async fn get(&self, address: &str) -> Result<Option<AddressRecord>> {
            Ok(self.rows.read().get(address).cloned())
        }

        async fn put(&self, record: AddressRecord) -> Result<()> {
            self.rows.write().insert(record.address.clone(), record);
            Ok(())
        }

        async fn claim_reusable(
            &self,
            _crypto_type: CryptoType,
            _channel_id: ChannelId,
            _now: DateTime<Utc>,
        ) -> Result<Option<AddressRecord>> {
            Ok(None)
        }

        async fn with_balance(&self, _crypto_type: CryptoType) -> Result<Vec<AddressRecord>> {
            Ok(Vec::new())
        }

        async fn stats(
            &self,
            crypto_type: CryptoType,
            _now: DateTime<Utc>,
        ) -> Result<AddressStats> {
            Ok(AddressStats {
                crypto_type,
                total: 0,
                bound: 0,
                reusable: 0,
                cooling_down: 0,
                with_balance: 0,
                total_balance: Decimal::ZERO,
            })
        }
    }

    struct OneAddress;

    #[async_trait]
    impl AddressProvisioner for OneAddress {
        async fn provision(&self, _crypto_type: CryptoType) -> Result<String> {
            Ok("bc1qtest".into())
        }
    }

    fn fixture() -> ChannelMachine {
        let pool = Arc::new(AddressPool::new(
            Arc::new(MapAddresses::default()),
            Arc::new(OneAddress),
        ));
        ChannelMachine::new(
            Arc::new(MapChannels::default()),
            pool,
            EngineConfig::default(),
        )
    }

    fn request() -> OpenChannelRequest {
        OpenChannelRequest {
            username: "tester".into(),
            crypto_type: CryptoType::Btc,
            amount_crypto: Decimal::new(1, 3),
            quote: PriceQuote {
                usd_per_unit: Decimal::new(50_000, 0),
            },
            public_keys: None,
        }
    }

    async fn confirmed(machine: &ChannelMachine) -> ChannelId {
        let channel = machine.open(request()).await.unwrap();
        machine
            .submit_deposit(channel.channel_id, TxHash::from("tx1"), Decimal::new(1, 3), 2)
            .await
            .unwrap();
        channel.channel_id
    }

    #[tokio::test]
    async fn terminal_transitions_shed_the_row_lock() {
        let machine = fixture();

        let completed = confirmed(&machine).await;
        let record = CreationRecord {
            method: CreationMethod::Delegation,
            act_used: 0,
            creation_fee: Decimal::ZERO,
            creation_tx: TxHash::from("create-tx"),
        };
        machine.complete(completed, record).await.unwrap();
        assert_eq!(machine.row_lock_entries(), 0);

        let failed = confirmed(&machine).await;
        machine.fail(failed, "keychain unreachable").await.unwrap();
        assert_eq!(machine.row_lock_entries(), 0);
    }

    #[tokio::test]
    async fn expiry_sweep_sheds_row_locks() {
        let machine = fixture();
        machine.open(request()).await.unwrap();

        let expired = machine
            .expire_overdue(Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(machine.row_lock_entries(), 0);
    }

    #[tokio::test]
    async fn recorded_decision_is_returned_not_overwritten() {
        let machine = fixture();
        let id = confirmed(&machine).await;

        let first = CreationDecision {
            method: CreationMethod::Act,
            creation_fee: Decimal::ZERO,
            decided_at: Utc::now(),
        };
        machine.record_creation_decision(id, first).await.unwrap();

        let second = CreationDecision {
            method: CreationMethod::Delegation,
            creation_fee: Decimal::ONE,
            decided_at: Utc::now(),
        };
        let kept = machine.record_creation_decision(id, second).await.unwrap();
        assert_eq!(kept.method, CreationMethod::Act);

        let row = machine.get(id).await.unwrap();
        assert_eq!(row.creation_decision.unwrap().method, CreationMethod::Act);
    }
}
