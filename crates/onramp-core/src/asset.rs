//! Per-asset capability table
//!
//! Every behavior that differs between supported chains lives here as data:
//! confirmation thresholds, memo requirements, address reuse cooldowns,
//! explorer links, and fee tier multipliers. Components look the behavior up
//! through [`CryptoType::spec`] instead of branching on the asset.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EngineError;

/// Supported crypto assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoType {
    /// Bitcoin
    Btc,
    /// Ethereum
    Eth,
    /// BNB Chain
    Bnb,
    /// Solana
    Sol,
    /// Polygon
    Matic,
    /// Hive (the account-creation target chain)
    Hive,
}

impl CryptoType {
    /// All supported assets, in display order
    pub const ALL: [CryptoType; 6] = [
        CryptoType::Btc,
        CryptoType::Eth,
        CryptoType::Bnb,
        CryptoType::Sol,
        CryptoType::Matic,
        CryptoType::Hive,
    ];

    /// Ticker symbol for API and storage use
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoType::Btc => "BTC",
            CryptoType::Eth => "ETH",
            CryptoType::Bnb => "BNB",
            CryptoType::Sol => "SOL",
            CryptoType::Matic => "MATIC",
            CryptoType::Hive => "HIVE",
        }
    }

    /// Capability table lookup for this asset
    pub fn spec(&self) -> &'static AssetSpec {
        match self {
            CryptoType::Btc => &BTC_SPEC,
            CryptoType::Eth => &ETH_SPEC,
            CryptoType::Bnb => &BNB_SPEC,
            CryptoType::Sol => &SOL_SPEC,
            CryptoType::Matic => &MATIC_SPEC,
            CryptoType::Hive => &HIVE_SPEC,
        }
    }
}

impl fmt::Display for CryptoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CryptoType {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" => Ok(CryptoType::Btc),
            "ETH" => Ok(CryptoType::Eth),
            "BNB" => Ok(CryptoType::Bnb),
            "SOL" => Ok(CryptoType::Sol),
            "MATIC" => Ok(CryptoType::Matic),
            "HIVE" => Ok(CryptoType::Hive),
            other => Err(EngineError::validation(format!(
                "Unsupported crypto asset: {other}"
            ))),
        }
    }
}

/// Fee tier multipliers applied to a base fee estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeTierMultipliers {
    /// Slow confirmation tier
    pub low: Decimal,
    /// Normal confirmation tier
    pub medium: Decimal,
    /// Priority confirmation tier
    pub high: Decimal,
}

/// Per-asset behavior table entry
///
/// One row per supported asset. Components consult this table rather than
/// matching on [`CryptoType`] themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSpec {
    /// Human-readable chain name
    pub name: &'static str,
    /// Decimal places of the smallest unit
    pub decimals: u32,
    /// Confirmations required before a deposit is treated as final
    pub min_confirmations: u32,
    /// Whether deposits require a memo/tag to identify the channel
    pub memo_required: bool,
    /// Seconds an address must rest after its channel goes terminal before
    /// it may be reissued
    pub reuse_cooldown_secs: i64,
    /// Explorer URL prefix; append the transaction hash
    pub explorer_tx_prefix: &'static str,
    /// Fee tier multipliers for consolidation estimates
    pub fee_tiers: FeeTierMultipliers,
}

impl AssetSpec {
    /// Cooldown before a terminal channel's address may be reissued
    pub fn reuse_cooldown(&self) -> Duration {
        Duration::seconds(self.reuse_cooldown_secs)
    }

    /// Explorer link for a transaction hash
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}{}", self.explorer_tx_prefix, tx_hash)
    }
}

static BTC_SPEC: AssetSpec = AssetSpec {
    name: "Bitcoin",
    decimals: 8,
    min_confirmations: 2,
    memo_required: false,
    reuse_cooldown_secs: 24 * 60 * 60,
    explorer_tx_prefix: "https://mempool.space/tx/",
    fee_tiers: FeeTierMultipliers {
        low: dec!(0.5),
        medium: dec!(1.0),
        high: dec!(2.0),
    },
};

static ETH_SPEC: AssetSpec = AssetSpec {
    name: "Ethereum",
    decimals: 18,
    min_confirmations: 12,
    memo_required: false,
    reuse_cooldown_secs: 12 * 60 * 60,
    explorer_tx_prefix: "https://etherscan.io/tx/",
    fee_tiers: FeeTierMultipliers {
        low: dec!(0.8),
        medium: dec!(1.0),
        high: dec!(1.5),
    },
};

static BNB_SPEC: AssetSpec = AssetSpec {
    name: "BNB Chain",
    decimals: 18,
    min_confirmations: 15,
    memo_required: false,
    reuse_cooldown_secs: 6 * 60 * 60,
    explorer_tx_prefix: "https://bscscan.com/tx/",
    fee_tiers: FeeTierMultipliers {
        low: dec!(0.8),
        medium: dec!(1.0),
        high: dec!(1.5),
    },
};

static SOL_SPEC: AssetSpec = AssetSpec {
    name: "Solana",
    decimals: 9,
    min_confirmations: 32,
    memo_required: false,
    reuse_cooldown_secs: 2 * 60 * 60,
    explorer_tx_prefix: "https://solscan.io/tx/",
    fee_tiers: FeeTierMultipliers {
        low: dec!(1.0),
        medium: dec!(1.0),
        high: dec!(1.2),
    },
};

static MATIC_SPEC: AssetSpec = AssetSpec {
    name: "Polygon",
    decimals: 18,
    min_confirmations: 64,
    memo_required: false,
    reuse_cooldown_secs: 6 * 60 * 60,
    explorer_tx_prefix: "https://polygonscan.com/tx/",
    fee_tiers: FeeTierMultipliers {
        low: dec!(0.8),
        medium: dec!(1.0),
        high: dec!(1.5),
    },
};

static HIVE_SPEC: AssetSpec = AssetSpec {
    name: "Hive",
    decimals: 3,
    min_confirmations: 1,
    memo_required: true,
    reuse_cooldown_secs: 60 * 60,
    explorer_tx_prefix: "https://hivehub.dev/tx/",
    fee_tiers: FeeTierMultipliers {
        low: dec!(1.0),
        medium: dec!(1.0),
        high: dec!(1.0),
    },
};
