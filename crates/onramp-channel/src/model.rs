//! Channel records and lifecycle states

use chrono::{DateTime, Utc};
use onramp_core::{ChannelId, CryptoType, Decimal, PublicKeySet, TxHash};
use serde::{Deserialize, Serialize};

// =============================================================================
// Status
// =============================================================================

/// Payment channel status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    /// Waiting for a deposit at the payment address
    Pending,
    /// Deposit detected and final; account creation may proceed
    Confirmed,
    /// Target account exists on-chain
    Completed,
    /// Irrecoverable downstream error
    Failed,
    /// No deposit arrived within the TTL
    Expired,
    /// Removed by an operator
    Cancelled,
}

impl ChannelStatus {
    /// Whether this status ends the lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChannelStatus::Completed
                | ChannelStatus::Failed
                | ChannelStatus::Expired
                | ChannelStatus::Cancelled
        )
    }

    /// Transition legality table. Cancellation is a deletion, not a
    /// transition, and is not represented here.
    pub fn can_transition_to(&self, next: ChannelStatus) -> bool {
        matches!(
            (self, next),
            (ChannelStatus::Pending, ChannelStatus::Confirmed)
                | (ChannelStatus::Pending, ChannelStatus::Failed)
                | (ChannelStatus::Pending, ChannelStatus::Expired)
                | (ChannelStatus::Confirmed, ChannelStatus::Completed)
                | (ChannelStatus::Confirmed, ChannelStatus::Failed)
        )
    }

    /// Status string used by the console filters and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Pending => "pending",
            ChannelStatus::Confirmed => "confirmed",
            ChannelStatus::Completed => "completed",
            ChannelStatus::Failed => "failed",
            ChannelStatus::Expired => "expired",
            ChannelStatus::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Account creation outcome (implicit request state inside a channel)
// =============================================================================

/// How a confirmed channel's account was (or will be) created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationMethod {
    /// One Account Creation Token was consumed
    Act,
    /// Resource delegation funded the creation
    Delegation,
}

/// Funding decision persisted at resolve time, before the creation
/// transaction is reported back.
///
/// Lives on the channel row so a restarted or second service instance
/// returns the recorded decision instead of consuming another ACT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationDecision {
    /// Method decided for this creation
    pub method: CreationMethod,
    /// Fee or delegation amount the operation will spend
    pub creation_fee: Decimal,
    /// When the decision was made
    pub decided_at: DateTime<Utc>,
}

/// Recorded outcome of account creation for a completed channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationRecord {
    /// Method that funded the creation
    pub method: CreationMethod,
    /// ACTs consumed (0 or 1)
    pub act_used: u8,
    /// Fee or delegation amount spent
    pub creation_fee: Decimal,
    /// Creation transaction id reported by the keychain
    pub creation_tx: TxHash,
}

// =============================================================================
// Channel record
// =============================================================================

/// One funding request: a generated deposit address paired with an expected
/// payment and a downstream account-creation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentChannel {
    /// Opaque, immutable identity
    pub channel_id: ChannelId,
    /// Target account name
    pub username: String,
    /// Asset expected at the payment address
    pub crypto_type: CryptoType,
    /// Deposit address issued from the pool
    pub payment_address: String,
    /// Deposit memo; present exactly when the asset requires one
    pub memo: Option<String>,
    /// Expected payment amount in the asset
    pub amount_crypto: Decimal,
    /// USD value priced at creation time, never re-priced
    pub amount_usd: Decimal,
    /// Current lifecycle status
    pub status: ChannelStatus,
    /// Key set for account creation; immutable once recorded
    pub public_keys: Option<PublicKeySet>,
    /// Deposit transaction hash, set on first detection
    pub tx_hash: Option<TxHash>,
    /// Why the channel failed, when status is `Failed`
    pub failure_reason: Option<String>,
    /// Funding decision, set once creation is resolved and pending
    pub creation_decision: Option<CreationDecision>,
    /// Creation outcome, set when status reaches `Completed`
    pub creation: Option<CreationRecord>,
    /// When the channel was opened
    pub created_at: DateTime<Utc>,
    /// When the deposit became final
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the account creation completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentChannel {
    /// Seconds from creation to deposit finality, once confirmed
    pub fn processing_time_seconds(&self) -> Option<i64> {
        self.confirmed_at
            .map(|at| (at - self.created_at).num_seconds())
    }

    /// Whether account creation is still owed for this channel
    pub fn awaiting_creation(&self) -> bool {
        self.status == ChannelStatus::Confirmed && self.public_keys.is_some()
    }
}

// =============================================================================
// Requests and filters
// =============================================================================

/// Spot price used to fix `amount_usd` at channel creation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// USD per one unit of the asset
    pub usd_per_unit: Decimal,
}

/// Inputs to open a new payment channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenChannelRequest {
    /// Target account name
    pub username: String,
    /// Asset the requester will pay in
    pub crypto_type: CryptoType,
    /// Expected payment amount
    pub amount_crypto: Decimal,
    /// Spot price at request time
    pub quote: PriceQuote,
    /// Keys for the account the deposit funds, if supplied up front
    pub public_keys: Option<PublicKeySet>,
}

/// Console-facing channel listing filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelFilter {
    /// Restrict to one status
    pub status: Option<ChannelStatus>,
    /// Restrict to one asset
    pub crypto_type: Option<CryptoType>,
    /// Only channels created at or after this instant
    pub created_after: Option<DateTime<Utc>>,
    /// Only channels created before this instant
    pub created_before: Option<DateTime<Utc>>,
    /// Page size cap; the store clamps to the engine maximum
    pub limit: Option<usize>,
}

impl ChannelFilter {
    /// Whether a channel passes this filter
    pub fn matches(&self, channel: &PaymentChannel) -> bool {
        if let Some(status) = self.status {
            if channel.status != status {
                return false;
            }
        }
        if let Some(asset) = self.crypto_type {
            if channel.crypto_type != asset {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if channel.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if channel.created_at >= before {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_STATUSES: [ChannelStatus; 6] = [
        ChannelStatus::Pending,
        ChannelStatus::Confirmed,
        ChannelStatus::Completed,
        ChannelStatus::Failed,
        ChannelStatus::Expired,
        ChannelStatus::Cancelled,
    ];

    #[test]
    fn terminal_statuses_admit_no_transition() {
        for from in ALL_STATUSES.iter().filter(|s| s.is_terminal()) {
            for to in ALL_STATUSES {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn pending_cannot_skip_to_completed() {
        assert!(!ChannelStatus::Pending.can_transition_to(ChannelStatus::Completed));
    }

    proptest! {
        /// Any legal transition chain is monotonic: once a terminal status is
        /// reached no further transition is legal, and no chain revisits
        /// `Pending`.
        #[test]
        fn transition_chains_never_regress(steps in proptest::collection::vec(0usize..6, 1..8)) {
            let mut current = ChannelStatus::Pending;
            for step in steps {
                let next = ALL_STATUSES[step];
                if current.can_transition_to(next) {
                    current = next;
                }
                prop_assert!(!current.can_transition_to(ChannelStatus::Pending));
                if current.is_terminal() {
                    for to in ALL_STATUSES {
                        prop_assert!(!current.can_transition_to(to));
                    }
                }
            }
        }
    }
}
