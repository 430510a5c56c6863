//! Shared fakes for the engine integration tests

// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use onramp_channel::AddressProvisioner;
use onramp_consolidation::{ChainClient, SweepInput};
use onramp_core::{CryptoType, Decimal, Result, TxHash};
use onramp_monitor::{DepositEvent, DepositSource, MonitorHealth};
use parking_lot::Mutex;
use rust_decimal_macros::dec;

/// Provisioner handing out `{prefix}{n}` addresses in sequence
pub struct SeqProvisioner {
    prefix: &'static str,
    counter: AtomicU64,
}

impl SeqProvisioner {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl AddressProvisioner for SeqProvisioner {
    async fn provision(&self, _crypto_type: CryptoType) -> Result<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}{n}", self.prefix))
    }
}

/// Chain client over a mutable balance table
pub struct FakeChain {
    balances: Mutex<HashMap<(CryptoType, String), Decimal>>,
    broadcasts: Mutex<Vec<TxHash>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_balance(&self, crypto_type: CryptoType, address: &str, balance: Decimal) {
        self.balances
            .lock()
            .insert((crypto_type, address.to_string()), balance);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().len()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn balance(&self, crypto_type: CryptoType, address: &str) -> Result<Decimal> {
        Ok(self
            .balances
            .lock()
            .get(&(crypto_type, address.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn estimate_fee(&self, _crypto_type: CryptoType, _input_count: usize) -> Result<Decimal> {
        Ok(dec!(0.001))
    }

    async fn broadcast_sweep(
        &self,
        crypto_type: CryptoType,
        inputs: &[SweepInput],
        _destination: &str,
        _fee: Decimal,
    ) -> Result<TxHash> {
        let mut balances = self.balances.lock();
        for input in inputs {
            balances.remove(&(crypto_type, input.address.clone()));
        }
        let mut broadcasts = self.broadcasts.lock();
        let tx = TxHash::from(format!("sweep-{}", broadcasts.len()));
        broadcasts.push(tx.clone());
        Ok(tx)
    }
}

/// A source that never yields; tests drive ingestion directly
pub struct IdleSource;

#[async_trait]
impl DepositSource for IdleSource {
    async fn next_event(&self) -> Result<Option<DepositEvent>> {
        Ok(None)
    }

    async fn health(&self) -> Result<MonitorHealth> {
        Ok(MonitorHealth {
            connected: true,
            watched_addresses: 0,
            last_event_at: None,
        })
    }
}

/// A deposit observation for `address` with the given confirmations
pub fn deposit(
    crypto_type: CryptoType,
    address: &str,
    tx: &str,
    amount: Decimal,
    confirmations: u32,
) -> DepositEvent {
    DepositEvent {
        address: address.to_string(),
        crypto_type,
        tx_hash: TxHash::from(tx),
        amount,
        confirmations,
        memo: None,
        detected_at: Utc::now(),
    }
}

/// Standard test collaborators
pub fn collaborators() -> (Arc<SeqProvisioner>, Arc<FakeChain>, Arc<IdleSource>) {
    (
        Arc::new(SeqProvisioner::new("addr")),
        Arc::new(FakeChain::new()),
        Arc::new(IdleSource),
    )
}
