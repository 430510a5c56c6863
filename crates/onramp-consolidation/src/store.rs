//! Plan persistence seam
//!
//! The single-flight guarantee lives in the store: inserting a plan while
//! another non-expired `planned` plan exists for the same asset must fail
//! atomically, so two concurrent prepares can never both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onramp_core::{CryptoType, PlanTxId, Result};

use crate::plan::ConsolidationPlan;

/// Persistence for consolidation plans
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Insert a freshly prepared plan.
    ///
    /// Atomic single-flight check: fails with `Conflict` when a non-expired
    /// `planned` plan already exists for the plan's asset.
    async fn insert_planned(&self, plan: ConsolidationPlan, now: DateTime<Utc>) -> Result<()>;

    /// Load a plan by its idempotency key
    async fn get(&self, tx_id: PlanTxId) -> Result<Option<ConsolidationPlan>>;

    /// Replace the full plan row
    async fn put(&self, plan: ConsolidationPlan) -> Result<()>;

    /// The non-expired `planned` plan for an asset, if any
    async fn active_plan(
        &self,
        crypto_type: CryptoType,
        now: DateTime<Utc>,
    ) -> Result<Option<ConsolidationPlan>>;
}
