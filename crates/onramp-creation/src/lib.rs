//! # Onramp Creation
//!
//! Decides and drives target-chain account creation for confirmed channels:
//! consume one Account Creation Token when the operator holds one, otherwise
//! fall back to delegation-funded creation. The ACT check-and-consume is a
//! single atomic ledger operation, since a race there would directly cause
//! a wrong business decision.

#![forbid(unsafe_code)]

pub mod ledger;
pub mod resolver;

pub use ledger::{LedgerSample, LedgerSnapshot, LedgerStore, RcCosts, ResourceLedger};
pub use resolver::{AccountCreationResolver, CreationOperation};
