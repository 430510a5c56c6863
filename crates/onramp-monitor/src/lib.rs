//! # Onramp Monitor
//!
//! Interface to the external blockchain monitor and the worker that feeds
//! its deposit reports into the channel state machine.
//!
//! The feed contract is deliberately weak: at-least-once delivery with
//! monotonically non-decreasing confirmation counts per transaction.
//! Deduplication and idempotency are absorbed here and in the machine,
//! never surfaced as an error.

#![forbid(unsafe_code)]

pub mod event;
pub mod ingest;
pub mod scripted;

pub use event::{DepositEvent, DepositSource, MonitorHealth};
pub use ingest::MonitorIngestor;
pub use scripted::ScriptedSource;
