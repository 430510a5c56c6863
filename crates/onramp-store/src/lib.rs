//! # Onramp Store
//!
//! In-memory reference implementations of the engine's storage seams.
//!
//! These back the tests and the default service wiring. Each implementation
//! keeps its rows behind a single `parking_lot` lock, which makes the ACT
//! check-and-decrement and the single-flight plan insert genuinely atomic
//! under concurrent callers. A relational
//! deployment replaces them with transaction- or CAS-based implementations
//! holding the same contracts.

#![forbid(unsafe_code)]

pub mod addresses;
pub mod channels;
pub mod ledger;
pub mod plans;

pub use addresses::MemoryAddressStore;
pub use channels::MemoryChannelStore;
pub use ledger::MemoryLedgerStore;
pub use plans::MemoryPlanStore;
