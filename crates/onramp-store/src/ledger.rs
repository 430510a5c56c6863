//! In-memory operator ledger
//!
//! The single ledger row lives behind one lock; `try_consume_act` and
//! `try_claim_act` are check-and-mutate under that lock, matching the
//! compare-and-swap contract the relational deployment provides.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use onramp_core::Result;
use onramp_creation::{LedgerSample, LedgerSnapshot, LedgerStore, RcCosts};
use parking_lot::Mutex;

struct LedgerRow {
    act_balance: u64,
    rc_mana: u64,
    rc_max_mana: u64,
    costs: RcCosts,
    history: VecDeque<LedgerSample>,
}

const HISTORY_CAPACITY: usize = 1024;

/// Single-row ledger behind one lock
pub struct MemoryLedgerStore {
    row: Mutex<LedgerRow>,
}

impl MemoryLedgerStore {
    /// Create a ledger with the given starting balances
    pub fn new(act_balance: u64, rc_mana: u64, rc_max_mana: u64) -> Self {
        Self {
            row: Mutex::new(LedgerRow {
                act_balance,
                rc_mana,
                rc_max_mana,
                costs: RcCosts::default(),
                history: VecDeque::new(),
            }),
        }
    }

    fn sample(row: &mut LedgerRow) {
        if row.history.len() == HISTORY_CAPACITY {
            row.history.pop_front();
        }
        row.history.push_back(LedgerSample {
            at: Utc::now(),
            act_balance: row.act_balance,
            rc_mana: row.rc_mana,
        });
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn snapshot(&self) -> Result<LedgerSnapshot> {
        let row = self.row.lock();
        Ok(LedgerSnapshot {
            act_balance: row.act_balance,
            rc_mana: row.rc_mana,
            rc_max_mana: row.rc_max_mana,
            costs: row.costs,
            updated_at: Utc::now(),
        })
    }

    async fn try_consume_act(&self) -> Result<bool> {
        let mut row = self.row.lock();
        if row.act_balance == 0 {
            return Ok(false);
        }
        row.act_balance -= 1;
        Self::sample(&mut row);
        Ok(true)
    }

    async fn try_claim_act(&self, cost: u64) -> Result<bool> {
        let mut row = self.row.lock();
        if row.rc_mana < cost {
            return Ok(false);
        }
        row.rc_mana -= cost;
        row.act_balance += 1;
        Self::sample(&mut row);
        Ok(true)
    }

    async fn credit_act(&self, count: u64) -> Result<()> {
        let mut row = self.row.lock();
        row.act_balance += count;
        Self::sample(&mut row);
        Ok(())
    }

    async fn record_rc(&self, mana: u64, max_mana: u64, costs: RcCosts) -> Result<()> {
        let mut row = self.row.lock();
        row.rc_mana = mana;
        row.rc_max_mana = max_mana;
        row.costs = costs;
        Self::sample(&mut row);
        Ok(())
    }

    async fn history(&self, limit: usize) -> Result<Vec<LedgerSample>> {
        let row = self.row.lock();
        let skip = row.history.len().saturating_sub(limit);
        Ok(row.history.iter().skip(skip).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consume_stops_at_zero() {
        let store = MemoryLedgerStore::new(1, 0, 0);
        assert!(store.try_consume_act().await.unwrap());
        assert!(!store.try_consume_act().await.unwrap());
        assert_eq!(store.snapshot().await.unwrap().act_balance, 0);
    }

    #[tokio::test]
    async fn concurrent_consumers_split_one_act() {
        use std::sync::Arc;

        let store = Arc::new(MemoryLedgerStore::new(1, 0, 0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.try_consume_act().await.unwrap()
            }));
        }
        let mut consumed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                consumed += 1;
            }
        }
        assert_eq!(consumed, 1, "exactly one consumer wins the last ACT");
    }

    #[tokio::test]
    async fn claim_requires_mana() {
        let store = MemoryLedgerStore::new(0, 100, 1000);
        assert!(!store.try_claim_act(200).await.unwrap());
        assert!(store.try_claim_act(50).await.unwrap());
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.act_balance, 1);
        assert_eq!(snapshot.rc_mana, 50);
    }

    #[tokio::test]
    async fn history_is_bounded_and_ordered() {
        let store = MemoryLedgerStore::new(0, 0, 0);
        for _ in 0..10 {
            store.credit_act(1).await.unwrap();
        }
        let recent = store.history(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent.last().unwrap().act_balance, 10);
    }
}
