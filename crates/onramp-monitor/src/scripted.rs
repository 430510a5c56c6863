//! Scripted monitor source for tests and the simulator wiring

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onramp_core::Result;
use parking_lot::Mutex;

use crate::event::{DepositEvent, DepositSource, MonitorHealth};

/// A source replaying a pre-programmed event sequence.
///
/// The script may contain duplicates and out-of-order confirmations on
/// purpose; consumers must absorb both.
pub struct ScriptedSource {
    events: Mutex<VecDeque<DepositEvent>>,
    watched_addresses: usize,
    last_event_at: Mutex<Option<DateTime<Utc>>>,
}

impl ScriptedSource {
    /// Create a source that will replay `events` in order
    pub fn new(events: impl IntoIterator<Item = DepositEvent>) -> Self {
        let events: VecDeque<_> = events.into_iter().collect();
        Self {
            watched_addresses: events.len(),
            events: Mutex::new(events),
            last_event_at: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DepositSource for ScriptedSource {
    async fn next_event(&self) -> Result<Option<DepositEvent>> {
        let next = self.events.lock().pop_front();
        if next.is_some() {
            *self.last_event_at.lock() = Some(Utc::now());
        }
        Ok(next)
    }

    async fn health(&self) -> Result<MonitorHealth> {
        Ok(MonitorHealth {
            connected: !self.events.lock().is_empty(),
            watched_addresses: self.watched_addresses,
            last_event_at: *self.last_event_at.lock(),
        })
    }
}
