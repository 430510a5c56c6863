//! In-memory plan store
//!
//! The single-flight check and the insert happen under one write lock;
//! of two concurrent prepares for the same asset exactly one lands.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onramp_consolidation::{ConsolidationPlan, PlanStore};
use onramp_core::{CryptoType, EngineError, PlanTxId, Result};
use parking_lot::RwLock;

/// Plan rows behind one lock
#[derive(Default)]
pub struct MemoryPlanStore {
    rows: RwLock<HashMap<PlanTxId, ConsolidationPlan>>,
}

impl MemoryPlanStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn insert_planned(&self, plan: ConsolidationPlan, now: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.write();
        if let Some(active) = rows
            .values()
            .find(|p| p.crypto_type == plan.crypto_type && p.is_active(now))
        {
            return Err(EngineError::conflict(format!(
                "plan {} for {} is already in flight",
                active.tx_id, plan.crypto_type
            )));
        }
        rows.insert(plan.tx_id, plan);
        Ok(())
    }

    async fn get(&self, tx_id: PlanTxId) -> Result<Option<ConsolidationPlan>> {
        Ok(self.rows.read().get(&tx_id).cloned())
    }

    async fn put(&self, plan: ConsolidationPlan) -> Result<()> {
        let mut rows = self.rows.write();
        if !rows.contains_key(&plan.tx_id) {
            return Err(EngineError::not_found(format!("plan {}", plan.tx_id)));
        }
        rows.insert(plan.tx_id, plan);
        Ok(())
    }

    async fn active_plan(
        &self,
        crypto_type: CryptoType,
        now: DateTime<Utc>,
    ) -> Result<Option<ConsolidationPlan>> {
        Ok(self
            .rows
            .read()
            .values()
            .find(|p| p.crypto_type == crypto_type && p.is_active(now))
            .cloned())
    }
}
