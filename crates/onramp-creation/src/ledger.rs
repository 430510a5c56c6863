//! ACT/RC resource ledger
//!
//! Single-row ledger for the operator account: ACT balance, RC mana, and the
//! RC cost table for account operations. The check-and-decrement operations
//! are atomic in the store (a transaction or compare-and-swap in the
//! relational deployment) so the no-double-spend invariant holds across
//! restarts and multiple service instances, not just within one process.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onramp_core::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// RC cost per account operation, as last synced from the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcCosts {
    /// Cost to claim one ACT from RC
    pub claim_account: u64,
    /// Cost to create an account spending a claimed ACT
    pub create_claimed_account: u64,
    /// Cost to create an account outright (delegation path)
    pub create_account: u64,
}

impl Default for RcCosts {
    fn default() -> Self {
        Self {
            claim_account: 10_000_000_000,
            create_claimed_account: 1_300_000_000,
            create_account: 1_500_000_000,
        }
    }
}

/// Point-in-time view of the operator's resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// ACTs available to spend
    pub act_balance: u64,
    /// Current RC mana
    pub rc_mana: u64,
    /// RC mana ceiling
    pub rc_max_mana: u64,
    /// Cost table
    pub costs: RcCosts,
    /// When this view was taken
    pub updated_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    /// RC mana as a percentage of the ceiling
    pub fn rc_percent(&self) -> f64 {
        if self.rc_max_mana == 0 {
            return 0.0;
        }
        (self.rc_mana as f64 / self.rc_max_mana as f64) * 100.0
    }
}

/// One point of the ACT/RC trend series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSample {
    /// Sample instant
    pub at: DateTime<Utc>,
    /// ACT balance at the instant
    pub act_balance: u64,
    /// RC mana at the instant
    pub rc_mana: u64,
}

/// Persistence seam for the single-row operator ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current snapshot
    async fn snapshot(&self) -> Result<LedgerSnapshot>;

    /// Atomic ACT check-and-decrement. Returns whether an ACT was consumed;
    /// of two concurrent callers racing one remaining ACT, exactly one
    /// receives `true`.
    async fn try_consume_act(&self) -> Result<bool>;

    /// Atomic RC-for-ACT claim: decrement `cost` mana and increment the ACT
    /// balance, or return `false` untouched when mana is short.
    async fn try_claim_act(&self, cost: u64) -> Result<bool>;

    /// Credit externally claimed ACTs
    async fn credit_act(&self, count: u64) -> Result<()>;

    /// Record a fresh RC observation from the chain
    async fn record_rc(&self, mana: u64, max_mana: u64, costs: RcCosts) -> Result<()>;

    /// Most recent trend samples, oldest first
    async fn history(&self, limit: usize) -> Result<Vec<LedgerSample>>;
}

/// Read-mostly ledger tracker exposed to the console
pub struct ResourceLedger {
    store: Arc<dyn LedgerStore>,
    /// RC mana floor below which `claim_act` is refused, from
    /// `act_claim_rc_cost` in the engine configuration
    min_claim_rc: u64,
}

impl ResourceLedger {
    /// Create a tracker over a ledger store
    pub fn new(store: Arc<dyn LedgerStore>, min_claim_rc: u64) -> Self {
        Self {
            store,
            min_claim_rc,
        }
    }

    /// Current ACT balance, RC mana, and cost table
    pub async fn status(&self) -> Result<LedgerSnapshot> {
        self.store.snapshot().await
    }

    /// Trend series for the console chart
    pub async fn history(&self, limit: usize) -> Result<Vec<LedgerSample>> {
        self.store.history(limit).await
    }

    /// Convert RC into one ACT when mana covers both the configured floor
    /// and the chain's claim cost.
    pub async fn claim_act(&self) -> Result<LedgerSnapshot> {
        let snapshot = self.store.snapshot().await?;
        if snapshot.rc_mana < self.min_claim_rc {
            return Err(EngineError::resource_exhausted(format!(
                "RC mana {} below configured claim floor {}",
                snapshot.rc_mana, self.min_claim_rc
            )));
        }
        let cost = snapshot.costs.claim_account;
        if !self.store.try_claim_act(cost).await? {
            return Err(EngineError::resource_exhausted(format!(
                "RC mana {} below claim cost {cost}",
                snapshot.rc_mana
            )));
        }
        tracing::info!(cost, "claimed one ACT from RC");
        self.store.snapshot().await
    }
}
