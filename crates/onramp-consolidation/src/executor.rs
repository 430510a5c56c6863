//! Consolidation planner and executor
//!
//! `info` is side-effect free; `prepare` snapshots balances into a
//! single-flight plan; `execute` revalidates the snapshot against the chain
//! before broadcasting and caches its result under the plan's `tx_id`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use onramp_core::{CryptoType, Decimal, EngineConfig, EngineError, PlanTxId, Result, TxHash};
use onramp_channel::AddressPool;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::plan::{
    ConsolidationInfo, ConsolidationPlan, ConsolidationResult, FeeEstimate, PlanStatus, Priority,
    SweepInput,
};
use crate::store::PlanStore;

/// Chain-side collaborator used for balance reads, fee estimation, and the
/// sweep broadcast. Implemented outside the engine.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current on-chain balance of one address
    async fn balance(&self, crypto_type: CryptoType, address: &str) -> Result<Decimal>;

    /// Base (medium-tier) fee for a sweep with `input_count` source addresses
    async fn estimate_fee(&self, crypto_type: CryptoType, input_count: usize) -> Result<Decimal>;

    /// Build, sign, and broadcast the sweep; returns the transaction hash
    async fn broadcast_sweep(
        &self,
        crypto_type: CryptoType,
        inputs: &[SweepInput],
        destination: &str,
        fee: Decimal,
    ) -> Result<TxHash>;
}

/// Three-phase consolidation coordinator
pub struct Consolidator {
    plans: Arc<dyn PlanStore>,
    pool: Arc<AddressPool>,
    chain: Arc<dyn ChainClient>,
    config: EngineConfig,
    /// Per-asset execute locks; a duplicate execute waits for the first and
    /// then reads the cached result instead of re-sweeping
    asset_locks: Mutex<HashMap<CryptoType, Arc<AsyncMutex<()>>>>,
}

impl Consolidator {
    /// Create a consolidator over the plan store, address pool, and chain
    pub fn new(
        plans: Arc<dyn PlanStore>,
        pool: Arc<AddressPool>,
        chain: Arc<dyn ChainClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            plans,
            pool,
            chain,
            config,
            asset_locks: Mutex::new(HashMap::new()),
        }
    }

    fn asset_lock(&self, crypto_type: CryptoType) -> Arc<AsyncMutex<()>> {
        self.asset_locks.lock().entry(crypto_type).or_default().clone()
    }

    fn tiered_fees(crypto_type: CryptoType, base_fee: Decimal) -> FeeEstimate {
        let tiers = &crypto_type.spec().fee_tiers;
        FeeEstimate {
            low: base_fee * tiers.low,
            medium: base_fee * tiers.medium,
            high: base_fee * tiers.high,
        }
    }

    // =========================================================================
    // Phase 1: info
    // =========================================================================

    /// Read-only view of what a sweep would move. Advisory only; no side
    /// effects.
    pub async fn info(&self, crypto_type: CryptoType) -> Result<ConsolidationInfo> {
        let inputs: Vec<SweepInput> = self
            .pool
            .sweepable(crypto_type)
            .await?
            .into_iter()
            .map(|r| SweepInput {
                address: r.address,
                balance: r.balance,
            })
            .collect();
        let total_balance: Decimal = inputs.iter().map(|i| i.balance).sum();
        let base_fee = self.chain.estimate_fee(crypto_type, inputs.len()).await?;
        let fee_estimate = Self::tiered_fees(crypto_type, base_fee);
        let net = |fee: Decimal| (total_balance - fee).max(Decimal::ZERO);
        Ok(ConsolidationInfo {
            crypto_type,
            net_amount: FeeEstimate {
                low: net(fee_estimate.low),
                medium: net(fee_estimate.medium),
                high: net(fee_estimate.high),
            },
            addresses: inputs,
            total_balance,
            fee_estimate,
        })
    }

    // =========================================================================
    // Phase 2: prepare
    // =========================================================================

    /// Snapshot the current sweepable set into a time-bounded plan.
    ///
    /// Rejects with `Conflict` while a non-expired plan for the asset is in
    /// flight: of two concurrent prepares exactly one succeeds.
    pub async fn prepare(
        &self,
        crypto_type: CryptoType,
        destination: &str,
        priority: Priority,
    ) -> Result<ConsolidationPlan> {
        if destination.trim().is_empty() {
            return Err(EngineError::validation("destination address is required"));
        }

        let info = self.info(crypto_type).await?;
        if info.addresses.is_empty() {
            return Err(EngineError::validation(format!(
                "no sweepable {crypto_type} balances"
            )));
        }
        let fee = info.fee_estimate.for_priority(priority);
        if info.total_balance <= fee {
            return Err(EngineError::validation(format!(
                "total balance {} does not cover the {} tier fee {fee}",
                info.total_balance,
                priority.as_str()
            )));
        }

        let now = Utc::now();
        let plan = ConsolidationPlan {
            tx_id: PlanTxId::new(),
            crypto_type,
            address_count: info.addresses.len(),
            inputs: info.addresses,
            total_balance: info.total_balance,
            fee_estimate: info.fee_estimate,
            net_amount: info.total_balance - fee,
            destination_address: destination.to_string(),
            priority,
            created_at: now,
            expires_at: now + self.config.plan_expiry(),
            status: PlanStatus::Planned,
            result: None,
        };
        self.plans.insert_planned(plan.clone(), now).await?;
        tracing::info!(
            tx_id = %plan.tx_id,
            asset = %crypto_type,
            addresses = plan.address_count,
            total = %plan.total_balance,
            "consolidation plan prepared"
        );
        Ok(plan)
    }

    // =========================================================================
    // Phase 3: execute
    // =========================================================================

    /// Execute a prepared plan.
    ///
    /// Idempotent on `tx_id`: a retry after success returns the original
    /// result. Balance drift since the snapshot aborts with `Stale` and
    /// leaves the plan `Planned`; an expired plan is refused and the asset
    /// becomes re-preparable.
    pub async fn execute(&self, tx_id: PlanTxId) -> Result<ConsolidationResult> {
        let mut plan = self
            .plans
            .get(tx_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("consolidation plan {tx_id}")))?;

        let lock = self.asset_lock(plan.crypto_type);
        let _guard = lock.lock().await;

        // Re-read under the lock; a concurrent execute may have finished.
        plan = self
            .plans
            .get(tx_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("consolidation plan {tx_id}")))?;

        match plan.status {
            PlanStatus::Executed => {
                return plan.result.clone().ok_or_else(|| {
                    EngineError::internal(format!("executed plan {tx_id} lost its result"))
                });
            }
            PlanStatus::Expired => {
                return Err(EngineError::stale(format!(
                    "plan {tx_id} expired; prepare a new one"
                )));
            }
            PlanStatus::Planned => {}
        }

        let now = Utc::now();
        if plan.is_expired(now) {
            plan.status = PlanStatus::Expired;
            self.plans.put(plan).await?;
            return Err(EngineError::stale(format!(
                "plan {tx_id} expired; prepare a new one"
            )));
        }

        // Revalidate every snapshotted balance before moving funds.
        for input in &plan.inputs {
            let current = self
                .chain
                .balance(plan.crypto_type, &input.address)
                .await?;
            if current != input.balance {
                // Keep the observed balance fresh for the next prepare.
                self.pool.record_balance(&input.address, current).await?;
                tracing::warn!(
                    tx_id = %tx_id,
                    address = %input.address,
                    planned = %input.balance,
                    current = %current,
                    "balance drifted since prepare; aborting execute"
                );
                return Err(EngineError::stale(format!(
                    "balance of {} changed since prepare ({} -> {current})",
                    input.address, input.balance
                )));
            }
        }

        let fee = plan.fee_estimate.for_priority(plan.priority);
        let tx_hash = self
            .chain
            .broadcast_sweep(
                plan.crypto_type,
                &plan.inputs,
                &plan.destination_address,
                fee,
            )
            .await?;

        // The funds moved the moment the broadcast succeeded. Persist the
        // outcome before any bookkeeping so a retry finds the cached result
        // instead of attempting a second sweep.
        let completed_at = Utc::now();
        let result = ConsolidationResult {
            blockchain_tx_hash: tx_hash,
            total_amount: plan.total_balance,
            addresses_consolidated: plan.address_count,
            completed_at,
        };
        plan.status = PlanStatus::Executed;
        plan.result = Some(result.clone());
        let inputs = plan.inputs.clone();
        self.plans.put(plan).await?;

        for input in &inputs {
            if let Err(e) = self.pool.record_balance(&input.address, Decimal::ZERO).await {
                tracing::warn!(
                    tx_id = %tx_id,
                    address = %input.address,
                    error = %e,
                    "balance reset after sweep failed"
                );
                continue;
            }
            // Swept and unbound: start the reuse cooldown.
            if let Err(e) = self.pool.mark_reusable(&input.address, completed_at).await {
                tracing::warn!(
                    tx_id = %tx_id,
                    address = %input.address,
                    error = %e,
                    "cooldown start after sweep failed"
                );
            }
        }

        tracing::info!(
            tx_id = %tx_id,
            tx = %result.blockchain_tx_hash,
            total = %result.total_amount,
            "consolidation executed"
        );
        Ok(result)
    }

    /// The in-flight plan for an asset, if one exists
    pub async fn active_plan(&self, crypto_type: CryptoType) -> Result<Option<ConsolidationPlan>> {
        self.plans.active_plan(crypto_type, Utc::now()).await
    }
}
