//! # Onramp Channel
//!
//! Payment channel lifecycle: the channel record, its state machine, the
//! deposit address pool, and the periodic expiry sweep.
//!
//! ## Lifecycle
//!
//! ```text
//! pending ──deposit final──▶ confirmed ──account created──▶ completed
//!    │                          │
//!    ├──TTL sweep──▶ expired    └──downstream error──▶ failed
//!    └──downstream error──▶ failed
//! ```
//!
//! Admin cancellation deletes the record and is permitted from any status.
//! All other transitions are monotonic; a duplicate monitor notification is
//! absorbed, never double-applied.
//!
//! Storage trait seams ([`ChannelStore`], [`AddressStore`]) are defined here
//! next to the records they persist; reference implementations live in
//! `onramp-store`.

#![forbid(unsafe_code)]

pub mod machine;
pub mod model;
pub mod pool;
pub mod store;
pub mod sweeper;

pub use machine::ChannelMachine;
pub use model::{
    ChannelFilter, ChannelStatus, CreationDecision, CreationMethod, CreationRecord,
    OpenChannelRequest, PaymentChannel, PriceQuote,
};
pub use pool::{AddressPool, AddressProvisioner};
pub use store::{AddressRecord, AddressStats, AddressStore, ChannelStore};
pub use sweeper::ExpirySweeper;
