//! # Onramp Core
//!
//! Foundation crate for the payment channel lifecycle and fund consolidation
//! engine. Everything here is plain data and policy tables; no I/O, no
//! storage, no async.
//!
//! ## What Belongs Here
//!
//! - Identifier newtypes (`ChannelId`, `PlanTxId`, `TxHash`)
//! - The per-asset capability table (`CryptoType`, `AssetSpec`)
//! - Public key sets recorded on a channel
//! - The unified error type (`EngineError`) and `Result` alias
//! - Engine configuration (`EngineConfig`)
//!
//! ## What Does NOT Belong Here
//!
//! - Storage traits or implementations (onramp-store)
//! - Channel lifecycle logic (onramp-channel)
//! - Anything that talks to a chain, a wallet, or a clock-driven worker

#![forbid(unsafe_code)]

pub mod asset;
pub mod config;
pub mod errors;
pub mod identifiers;
pub mod keys;

pub use asset::{AssetSpec, CryptoType};
pub use config::EngineConfig;
pub use errors::{EngineError, Result};
pub use identifiers::{ChannelId, PlanTxId, TxHash};
pub use keys::PublicKeySet;

/// Decimal amount type used for crypto and USD values throughout the engine.
pub use rust_decimal::Decimal;
