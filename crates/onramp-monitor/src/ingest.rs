//! Deposit ingestion worker
//!
//! Pulls observations from the monitor source, resolves each to its channel,
//! and forwards it to the state machine. Duplicate, unknown, and stale
//! events are absorbed with a log line; the worker never stops over a single
//! bad event.

use std::collections::VecDeque;
use std::sync::Arc;

use onramp_channel::{AddressPool, ChannelMachine, ChannelStore};
use onramp_core::EngineError;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::event::{DepositEvent, DepositSource, MonitorHealth};

/// Worker feeding monitor events into the channel machine
pub struct MonitorIngestor {
    source: Arc<dyn DepositSource>,
    machine: Arc<ChannelMachine>,
    channels: Arc<dyn ChannelStore>,
    pool: Arc<AddressPool>,
    recent: Mutex<VecDeque<DepositEvent>>,
    recent_capacity: usize,
}

impl MonitorIngestor {
    /// Create an ingestor over a source, machine, channel lookup, and pool
    pub fn new(
        source: Arc<dyn DepositSource>,
        machine: Arc<ChannelMachine>,
        channels: Arc<dyn ChannelStore>,
        pool: Arc<AddressPool>,
        recent_capacity: usize,
    ) -> Self {
        Self {
            source,
            machine,
            channels,
            pool,
            recent: Mutex::new(VecDeque::with_capacity(recent_capacity)),
            recent_capacity,
        }
    }

    /// Apply one observation. Public so tests and poll-style deployments can
    /// drive ingestion without the spawned loop.
    pub async fn ingest(&self, event: DepositEvent) {
        {
            let mut recent = self.recent.lock();
            if recent.len() == self.recent_capacity {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        // Track the observed funds first. A deposit landing after the
        // channel expired still sits on a pool address, and consolidation
        // can only sweep what was recorded.
        match self.pool.record_balance(&event.address, event.amount).await {
            Ok(()) => {}
            // Not a pool address; nothing to track.
            Err(EngineError::NotFound { .. }) => {}
            Err(e) => {
                tracing::warn!(address = %event.address, error = %e, "balance update failed");
            }
        }

        let channel = match self
            .channels
            .find_open_by_address(&event.address, event.memo.as_deref())
            .await
        {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                tracing::debug!(
                    address = %event.address,
                    tx = %event.tx_hash,
                    "deposit at an address with no open channel"
                );
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, address = %event.address, "channel lookup failed");
                return;
            }
        };

        if channel.crypto_type != event.crypto_type {
            tracing::warn!(
                channel_id = %channel.channel_id,
                expected = %channel.crypto_type,
                got = %event.crypto_type,
                "asset mismatch on deposit event; dropping"
            );
            return;
        }

        if let Err(e) = self
            .machine
            .submit_deposit(
                channel.channel_id,
                event.tx_hash.clone(),
                event.amount,
                event.confirmations,
            )
            .await
        {
            // Redelivery against a just-deleted channel lands here; absorbed.
            tracing::debug!(
                channel_id = %channel.channel_id,
                tx = %event.tx_hash,
                error = %e,
                "deposit application skipped"
            );
        }
    }

    /// Spawn the pull loop. Exits when the source ends or `shutdown`
    /// observes `true`.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = self.source.next_event() => {
                        match event {
                            Ok(Some(event)) => self.ingest(event).await,
                            Ok(None) => {
                                tracing::info!("monitor feed ended");
                                break;
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "monitor source error");
                                // Transient source failures back off briefly.
                                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::debug!("monitor ingestor shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Most recent observations, oldest first
    pub fn recent_detections(&self) -> Vec<DepositEvent> {
        self.recent.lock().iter().cloned().collect()
    }

    /// Health of the underlying source
    pub async fn health(&self) -> onramp_core::Result<MonitorHealth> {
        self.source.health().await
    }
}
