//! # Onramp Consolidation
//!
//! Sweeps residual balances from many spent addresses of one asset into one
//! destination, through an explicit three-phase protocol:
//!
//! 1. **Info**: read-only view of sweepable balances and fee tiers.
//! 2. **Prepare**: snapshot balances into a time-bounded [`ConsolidationPlan`]
//!    with a `tx_id` idempotency key; at most one live plan per asset.
//! 3. **Execute**: revalidate the snapshot against the chain, broadcast,
//!    and cache the result so a retried execute returns it verbatim.
//!
//! Funds are never swept without an auditable, non-expired plan; any balance
//! drift between prepare and execute aborts without partial effect.

#![forbid(unsafe_code)]

pub mod executor;
pub mod plan;
pub mod store;

pub use executor::{ChainClient, Consolidator};
pub use plan::{
    ConsolidationInfo, ConsolidationPlan, ConsolidationResult, FeeEstimate, PlanStatus, Priority,
    SweepInput,
};
pub use store::PlanStore;
