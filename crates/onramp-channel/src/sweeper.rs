//! Periodic expiry sweep
//!
//! A channel that is never queried must still expire, so expiry is driven by
//! this interval task rather than by on-demand checks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::machine::ChannelMachine;

/// Interval task sweeping overdue `pending` channels to `expired`
pub struct ExpirySweeper {
    machine: Arc<ChannelMachine>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper over a machine with the given sweep interval
    pub fn new(machine: Arc<ChannelMachine>, interval: Duration) -> Self {
        Self { machine, interval }
    }

    /// Spawn the sweep loop. The loop exits when `shutdown` observes `true`.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.machine.expire_overdue(Utc::now()).await {
                            Ok(expired) if !expired.is_empty() => {
                                tracing::info!(count = expired.len(), "expiry sweep pass");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::error!(error = %e, "expiry sweep failed");
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::debug!("expiry sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}
