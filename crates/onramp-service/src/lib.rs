//! # Onramp Service
//!
//! Facade wiring the engine components together and exposing the surface the
//! admin console calls: channel listing and lifecycle actions, consolidation
//! phases, address statistics, ACT/RC status, and monitor health. The REST
//! layer on top of this is presentation code and lives outside the engine.

#![forbid(unsafe_code)]

pub mod logging;
pub mod service;

pub use service::{EngineDeps, EngineService, WorkerHandles};
