//! Consolidation plan and result types

use chrono::{DateTime, Utc};
use onramp_core::{CryptoType, Decimal, PlanTxId, TxHash};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use onramp_core::EngineError;

/// Fee priority tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Slow confirmation, lowest fee
    Low,
    /// Normal confirmation
    Medium,
    /// Priority confirmation, highest fee
    High,
}

impl Priority {
    /// Tier name used by the console
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(EngineError::validation(format!(
                "Unknown priority tier: {other}"
            ))),
        }
    }
}

/// Advisory fee estimate per priority tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    /// Low tier fee
    pub low: Decimal,
    /// Medium tier fee
    pub medium: Decimal,
    /// High tier fee
    pub high: Decimal,
}

impl FeeEstimate {
    /// Fee for a chosen tier
    pub fn for_priority(&self, priority: Priority) -> Decimal {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
        }
    }
}

/// Read-only phase-1 view of what a sweep would move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationInfo {
    /// Asset the view covers
    pub crypto_type: CryptoType,
    /// Sweepable addresses and their observed balances
    pub addresses: Vec<SweepInput>,
    /// Sum of sweepable balances
    pub total_balance: Decimal,
    /// Advisory fee per tier
    pub fee_estimate: FeeEstimate,
    /// Net received at the destination per tier
    pub net_amount: FeeEstimate,
}

/// One swept address with its snapshotted balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepInput {
    /// Source address
    pub address: String,
    /// Balance at snapshot time
    pub balance: Decimal,
}

/// Plan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Prepared and executable until expiry
    Planned,
    /// Swept; result cached for idempotent re-reads
    Executed,
    /// Timed out before execution; the asset is re-preparable
    Expired,
}

/// A proposed sweep of one asset's residual balances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationPlan {
    /// Idempotency key for the execute phase
    pub tx_id: PlanTxId,
    /// Asset being swept
    pub crypto_type: CryptoType,
    /// Balance snapshot taken at prepare time
    pub inputs: Vec<SweepInput>,
    /// Number of source addresses
    pub address_count: usize,
    /// Sum of snapshotted balances
    pub total_balance: Decimal,
    /// Fee estimate per tier at prepare time
    pub fee_estimate: FeeEstimate,
    /// Net amount at the chosen tier
    pub net_amount: Decimal,
    /// Destination address for the swept funds
    pub destination_address: String,
    /// Chosen fee tier
    pub priority: Priority,
    /// When the plan was prepared
    pub created_at: DateTime<Utc>,
    /// When the fee estimate goes stale and the plan expires
    pub expires_at: DateTime<Utc>,
    /// Current plan state
    pub status: PlanStatus,
    /// Cached execution result, set when `status` is `Executed`
    pub result: Option<ConsolidationResult>,
}

impl ConsolidationPlan {
    /// Whether the plan has outlived its fee estimate at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == PlanStatus::Planned && now >= self.expires_at
    }

    /// Whether the plan blocks a new `prepare` for its asset at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == PlanStatus::Planned && now < self.expires_at
    }
}

/// Outcome of an executed sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    /// Broadcast sweep transaction hash
    pub blockchain_tx_hash: TxHash,
    /// Total amount moved from the source addresses
    pub total_amount: Decimal,
    /// Number of addresses emptied
    pub addresses_consolidated: usize,
    /// When the sweep completed
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn priority_round_trips() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(p.as_str().parse::<Priority>().unwrap(), p);
        }
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn fee_estimate_selects_tier() {
        let fees = FeeEstimate {
            low: dec!(0.1),
            medium: dec!(0.2),
            high: dec!(0.4),
        };
        assert_eq!(fees.for_priority(Priority::High), dec!(0.4));
    }

    #[test]
    fn expiry_flips_activity() {
        let now = Utc::now();
        let plan = ConsolidationPlan {
            tx_id: PlanTxId::new(),
            crypto_type: CryptoType::Eth,
            inputs: vec![],
            address_count: 0,
            total_balance: Decimal::ZERO,
            fee_estimate: FeeEstimate {
                low: Decimal::ZERO,
                medium: Decimal::ZERO,
                high: Decimal::ZERO,
            },
            net_amount: Decimal::ZERO,
            destination_address: "0xdest".into(),
            priority: Priority::Medium,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(15),
            status: PlanStatus::Planned,
            result: None,
        };
        assert!(plan.is_active(now));
        assert!(!plan.is_expired(now));
        let later = now + chrono::Duration::minutes(16);
        assert!(!plan.is_active(later));
        assert!(plan.is_expired(later));
    }
}
