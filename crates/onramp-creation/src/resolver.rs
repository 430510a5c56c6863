//! Account creation resolver
//!
//! Once a channel is confirmed and carries public keys, `resolve` decides
//! how the account gets funded and returns a signable operation descriptor.
//! The operator submits the descriptor through the external keychain and
//! reports the broadcast transaction back via `complete`, which drives the
//! channel to `completed`.

use std::sync::Arc;

use chrono::Utc;
use onramp_core::{ChannelId, Decimal, EngineConfig, EngineError, PublicKeySet, Result, TxHash};
use onramp_channel::{
    ChannelMachine, ChannelStatus, CreationDecision, CreationMethod, CreationRecord,
    PaymentChannel,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::ledger::LedgerStore;

/// Signable account-creation operation descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationOperation {
    /// Channel the creation settles
    pub channel_id: ChannelId,
    /// Account name to create
    pub username: String,
    /// Funding method decided for this creation
    pub method: CreationMethod,
    /// Key set to install on the new account
    pub public_keys: PublicKeySet,
    /// Fee or delegation amount the operation will spend
    pub creation_fee: Decimal,
}

/// Decides and drives account creation for confirmed channels
pub struct AccountCreationResolver {
    machine: Arc<ChannelMachine>,
    ledger: Arc<dyn LedgerStore>,
    config: EngineConfig,
    /// Held across the decide-and-record sequence so two in-process
    /// resolves cannot interleave between the ledger decrement and the
    /// decision landing on the channel row.
    decide: Mutex<()>,
}

impl AccountCreationResolver {
    /// Create a resolver over the channel machine and operator ledger
    pub fn new(
        machine: Arc<ChannelMachine>,
        ledger: Arc<dyn LedgerStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            machine,
            ledger,
            config,
            decide: Mutex::new(()),
        }
    }

    fn operation_for(
        &self,
        channel: &PaymentChannel,
        keys: PublicKeySet,
        decision: &CreationDecision,
    ) -> CreationOperation {
        CreationOperation {
            channel_id: channel.channel_id,
            username: channel.username.clone(),
            method: decision.method,
            public_keys: keys,
            creation_fee: decision.creation_fee,
        }
    }

    /// Decide the funding method for a confirmed channel and return the
    /// operation descriptor for the keychain.
    ///
    /// The decision is persisted on the channel row the moment it is made,
    /// so a repeated call, a restarted service, or a second instance over
    /// the same store all get the recorded descriptor back without touching
    /// the ledger again. When neither an ACT nor delegation capacity is
    /// available the channel is failed with a recorded reason and the call
    /// returns `ResourceExhausted`; this is not retried automatically.
    pub async fn resolve(&self, channel_id: ChannelId) -> Result<CreationOperation> {
        let _serial = self.decide.lock().await;

        let channel = self.machine.get(channel_id).await?;
        let Some(keys) = channel.public_keys.clone() else {
            return Err(EngineError::validation(format!(
                "channel {channel_id} has no public keys; cannot create an account"
            )));
        };
        if let Some(decision) = &channel.creation_decision {
            return Ok(self.operation_for(&channel, keys, decision));
        }
        if channel.status != ChannelStatus::Confirmed {
            return Err(EngineError::conflict(format!(
                "channel {channel_id} is {}, not confirmed",
                channel.status.as_str()
            )));
        }

        // The one race-sensitive decision in the engine: the method choice
        // is recorded in the same breath as the atomic check-and-decrement.
        let method = if self.ledger.try_consume_act().await? {
            CreationMethod::Act
        } else {
            let snapshot = self.ledger.snapshot().await?;
            if snapshot.rc_mana < snapshot.costs.create_account {
                let reason = format!(
                    "no ACT available and RC mana {} below create_account cost {}",
                    snapshot.rc_mana, snapshot.costs.create_account
                );
                self.machine.fail(channel_id, reason.clone()).await?;
                return Err(EngineError::resource_exhausted(reason));
            }
            CreationMethod::Delegation
        };

        let decision = CreationDecision {
            method,
            creation_fee: match method {
                CreationMethod::Act => Decimal::ZERO,
                CreationMethod::Delegation => self.config.delegation_amount,
            },
            decided_at: Utc::now(),
        };
        // If another instance beat us to the row the recorded decision wins
        // and ours is discarded; the ACT credit below keeps the ledger
        // honest in that case.
        let recorded = self
            .machine
            .record_creation_decision(channel_id, decision.clone())
            .await?;
        if recorded != decision && method == CreationMethod::Act {
            self.ledger.credit_act(1).await?;
        }

        let op = self.operation_for(&channel, keys, &recorded);
        tracing::info!(
            %channel_id,
            username = %op.username,
            method = ?op.method,
            "account creation resolved"
        );
        Ok(op)
    }

    /// Report the broadcast creation transaction back, completing the
    /// channel.
    pub async fn complete(
        &self,
        channel_id: ChannelId,
        creation_tx: TxHash,
        method: CreationMethod,
    ) -> Result<()> {
        let channel = self.machine.get(channel_id).await?;
        let creation_fee = channel
            .creation_decision
            .as_ref()
            .map(|d| d.creation_fee)
            .unwrap_or(match method {
                CreationMethod::Act => Decimal::ZERO,
                CreationMethod::Delegation => self.config.delegation_amount,
            });
        let record = CreationRecord {
            method,
            act_used: match method {
                CreationMethod::Act => 1,
                CreationMethod::Delegation => 0,
            },
            creation_fee,
            creation_tx,
        };
        self.machine.complete(channel_id, record).await?;
        Ok(())
    }

    /// Drive every channel still owing a creation, returning the operation
    /// descriptors for the operator to sign. Channels that cannot be funded
    /// are failed individually; one exhausted channel does not stop the
    /// batch.
    pub async fn process_pending(&self) -> Result<Vec<CreationOperation>> {
        let mut operations = Vec::new();
        for channel in self.machine.awaiting_creation().await? {
            match self.resolve(channel.channel_id).await {
                Ok(op) => operations.push(op),
                Err(EngineError::ResourceExhausted { message }) => {
                    tracing::warn!(
                        channel_id = %channel.channel_id,
                        %message,
                        "creation funding exhausted"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(operations)
    }
}
