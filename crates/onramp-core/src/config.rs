//! Engine configuration
//!
//! Plain-old-data settings for the lifecycle and consolidation components.
//! Loadable from TOML; every field has a default so deployments only
//! override what they need.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::errors::{EngineError, Result};

/// Configuration for the onramp engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds a channel may stay `pending` with no detected deposit before
    /// the expiry sweep moves it to `expired`
    pub channel_ttl_secs: i64,

    /// Interval of the periodic expiry sweep
    pub sweep_interval_secs: u64,

    /// Seconds after which a `planned` consolidation plan expires (the fee
    /// estimate is stale beyond this window)
    pub plan_expiry_secs: i64,

    /// HIVE delegated to a new account when creation falls back from ACT
    pub delegation_amount: Decimal,

    /// RC mana required before `claim_act` is permitted
    pub act_claim_rc_cost: u64,

    /// Upper bound on channels returned by a single list call
    pub max_channels_page: usize,

    /// Capacity of the recent-detection ring kept for the console
    pub recent_detections: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
            plan_expiry_secs: 15 * 60,
            delegation_amount: dec!(3.0),
            act_claim_rc_cost: 10_000_000_000,
            max_channels_page: 500,
            recent_detections: 100,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document, falling back to defaults for missing fields
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| EngineError::validation(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot operate under
    pub fn validate(&self) -> Result<()> {
        if self.channel_ttl_secs <= 0 {
            return Err(EngineError::validation("channel_ttl_secs must be positive"));
        }
        if self.plan_expiry_secs <= 0 {
            return Err(EngineError::validation("plan_expiry_secs must be positive"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(EngineError::validation(
                "sweep_interval_secs must be positive",
            ));
        }
        if self.delegation_amount <= Decimal::ZERO {
            return Err(EngineError::validation(
                "delegation_amount must be positive",
            ));
        }
        if self.max_channels_page == 0 {
            return Err(EngineError::validation(
                "max_channels_page must be positive",
            ));
        }
        Ok(())
    }

    /// Channel TTL as a duration
    pub fn channel_ttl(&self) -> Duration {
        Duration::seconds(self.channel_ttl_secs)
    }

    /// Plan expiry window as a duration
    pub fn plan_expiry(&self) -> Duration {
        Duration::seconds(self.plan_expiry_secs)
    }
}
