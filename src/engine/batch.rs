//! PaymentBatchCoordinator — threshold-gated, all-at-once payouts.
//!
//! Exactly one batch is open at any time. Each sweep recounts the
//! eligible population (verified, withdrawable profit at or above the
//! payout threshold) into the open batch; once the count reaches the
//! target the batch completes and every counted member is settled.
//!
//! The sweep locks accounts in ascending id order and keeps the guard of
//! every eligible account until that account is settled, so no accrual or
//! verification can land between being counted and being captured.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::{Applied, Engine};
use crate::ledger::lock;
use crate::scheduler::SingleFlight;
use crate::types::{naira, Notice, PaymentBatch, Transaction, TransactionKind, UserAccount, UserId};

// ---------------------------------------------------------------------------
// Batch book
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BatchBook {
    batches: Vec<PaymentBatch>,
    next_id: u64,
    target_size: u32,
}

impl BatchBook {
    /// The open batch, created if none exists.
    fn open_mut(&mut self) -> &mut PaymentBatch {
        let has_open = self.batches.last().is_some_and(|b| !b.completed);
        if !has_open {
            let batch = PaymentBatch::open(self.next_id, self.target_size);
            info!(batch_id = batch.id, target = batch.target_size, "Opened payment batch");
            self.next_id += 1;
            self.batches.push(batch);
        }
        let last = self.batches.len() - 1;
        &mut self.batches[last]
    }
}

pub struct PaymentBatchCoordinator {
    book: Mutex<BatchBook>,
    flight: SingleFlight,
}

impl PaymentBatchCoordinator {
    pub fn new(target_size: u32) -> Self {
        Self::restore(target_size, Vec::new(), 1)
    }

    pub fn restore(target_size: u32, batches: Vec<PaymentBatch>, next_id: u64) -> Self {
        let next_id = batches
            .iter()
            .map(|b| b.id + 1)
            .max()
            .unwrap_or(1)
            .max(next_id);
        Self {
            book: Mutex::new(BatchBook { batches, next_id, target_size }),
            flight: SingleFlight::new(),
        }
    }

    /// All batches, oldest first, and the next id to hand out.
    pub fn export(&self) -> (Vec<PaymentBatch>, u64) {
        let book = lock(&self.book);
        (book.batches.clone(), book.next_id)
    }

    /// Run `f` over the batches and next id with the book locked.
    pub(crate) fn frozen<R>(&self, f: impl FnOnce(&[PaymentBatch], u64) -> R) -> R {
        let book = lock(&self.book);
        f(&book.batches, book.next_id)
    }

    fn book(&self) -> MutexGuard<'_, BatchBook> {
        lock(&self.book)
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// One member's payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub user_id: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SweepOutcome {
    /// Threshold not reached; the open batch carries the new count.
    Pending { batch_id: u64, current_count: u32, target_size: u32 },
    /// The batch completed and every member was settled.
    Released {
        batch_id: u64,
        payout_date: DateTime<Utc>,
        settlements: Vec<Settlement>,
        next_batch_id: u64,
    },
}

impl Engine {
    /// The currently open batch (created lazily).
    pub fn open_batch(&self) -> PaymentBatch {
        self.batches.book().open_mut().clone()
    }

    /// Every batch, completed ones included, oldest first.
    pub fn batches(&self) -> Vec<PaymentBatch> {
        self.batches.export().0
    }

    /// Recount the open batch and release it if full. `None` if a
    /// previous sweep is still running.
    pub fn tick_batch_sweep(&self) -> Option<Applied<SweepOutcome>> {
        let _flight = self.batches.flight.try_begin()?;
        let mut book = self.batches.book();
        let threshold = self.config.payout_threshold;

        // Lock every account in id order, keeping only the eligible ones.
        let handles = self.users.handles();
        let mut members: Vec<MutexGuard<'_, UserAccount>> = handles
            .iter()
            .map(|(_, h)| lock(h))
            .filter(|a| a.is_payout_eligible(threshold))
            .collect();

        let batch = book.open_mut();
        batch.current_count = u32::try_from(members.len()).unwrap_or(u32::MAX);

        if !batch.is_full() {
            info!(
                batch_id = batch.id,
                current = batch.current_count,
                target = batch.target_size,
                "Payment batch pending"
            );
            return Some(Applied::quiet(SweepOutcome::Pending {
                batch_id: batch.id,
                current_count: batch.current_count,
                target_size: batch.target_size,
            }));
        }

        let now = self.clock.now_utc();
        batch.completed = true;
        batch.payout_date = Some(now);
        let batch_id = batch.id;

        let mut settlements = Vec::with_capacity(members.len());
        let mut ledger_entries = Vec::with_capacity(members.len());
        let mut notices = Vec::with_capacity(members.len());

        for account in members.iter_mut() {
            let amount = std::mem::replace(&mut account.withdrawable_profit, Decimal::ZERO);
            ledger_entries.push(
                Transaction::completed(&account.id, amount, TransactionKind::Withdrawal, now)
                    .with_description(format!("batch #{batch_id} payout")),
            );
            notices.push(Notice::new(
                &account.id,
                format!("💳 Payment processed! {} has been released in batch #{batch_id}.", naira(amount)),
            ));
            settlements.push(Settlement { user_id: account.id.clone(), amount });
        }
        self.transactions.extend(ledger_entries);
        drop(members);

        let next_batch_id = book.open_mut().id;
        let total: Decimal = settlements.iter().map(|s| s.amount).sum();
        if settlements.is_empty() {
            warn!(batch_id, "Released a batch with no members (target size is zero)");
        }
        info!(
            batch_id,
            members = settlements.len(),
            total = %total,
            next_batch_id,
            "Payment batch released"
        );

        Some(Applied::new(
            SweepOutcome::Released {
                batch_id,
                payout_date: now,
                settlements,
                next_batch_id,
            },
            notices,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::engine::tests::test_engine;
    use rust_decimal_macros::dec;

    fn small_batches(target: u32) -> LedgerConfig {
        LedgerConfig { batch_target_size: target, ..LedgerConfig::default() }
    }

    fn make_eligible(engine: &Engine, id: &str, profit: Decimal) {
        engine.create_or_get_user(id);
        engine.users().update(id, |a| {
            a.verified = true;
            a.withdrawable_profit = profit;
        });
    }

    #[test]
    fn test_open_batch_created_lazily() {
        let (engine, _) = test_engine(small_batches(3));
        assert!(engine.batches().is_empty());
        let batch = engine.open_batch();
        assert_eq!(batch.id, 1);
        assert_eq!(batch.current_count, 0);
        assert!(!batch.completed);
        // Same batch on the next call
        assert_eq!(engine.open_batch().id, 1);
        assert_eq!(engine.batches().len(), 1);
    }

    #[test]
    fn test_sweep_pending_counts_only_eligible() {
        let (engine, _) = test_engine(small_batches(3));
        make_eligible(&engine, "a", dec!(6000));
        make_eligible(&engine, "b", dec!(4999));
        engine.create_or_get_user("c");
        engine.users().update("c", |a| a.withdrawable_profit = dec!(9000)); // unverified

        let out = engine.tick_batch_sweep().unwrap();
        assert_eq!(
            out.value,
            SweepOutcome::Pending { batch_id: 1, current_count: 1, target_size: 3 }
        );
        assert!(out.notices.is_empty());
        assert_eq!(engine.open_batch().current_count, 1);
        assert_eq!(engine.user("a").unwrap().withdrawable_profit, dec!(6000));
    }

    #[test]
    fn test_sweep_count_is_recomputed_not_accumulated() {
        let (engine, _) = test_engine(small_batches(5));
        make_eligible(&engine, "a", dec!(6000));
        engine.tick_batch_sweep();
        engine.tick_batch_sweep();
        assert_eq!(engine.open_batch().current_count, 1);
    }

    #[test]
    fn test_sweep_releases_full_batch() {
        let (engine, _) = test_engine(small_batches(3));
        make_eligible(&engine, "a", dec!(5000));
        make_eligible(&engine, "b", dec!(7250.50));
        make_eligible(&engine, "c", dec!(12000));
        make_eligible(&engine, "d", dec!(100)); // verified, below threshold

        let out = engine.tick_batch_sweep().unwrap();
        let SweepOutcome::Released { batch_id, settlements, next_batch_id, .. } = out.value else {
            panic!("expected release");
        };
        assert_eq!(batch_id, 1);
        assert_eq!(next_batch_id, 2);
        assert_eq!(settlements.len(), 3);
        assert_eq!(out.notices.len(), 3);
        assert_eq!(
            settlements[1],
            Settlement { user_id: "b".to_string(), amount: dec!(7250.50) }
        );

        for (id, amount) in [("a", dec!(5000)), ("b", dec!(7250.50)), ("c", dec!(12000))] {
            assert_eq!(engine.user(id).unwrap().withdrawable_profit, Decimal::ZERO);
            let withdrawals: Vec<_> = engine
                .transactions_for(id)
                .into_iter()
                .filter(|t| t.kind == TransactionKind::Withdrawal)
                .collect();
            assert_eq!(withdrawals.len(), 1);
            assert_eq!(withdrawals[0].amount, amount);
        }
        assert_eq!(engine.user("d").unwrap().withdrawable_profit, dec!(100));

        let batches = engine.batches();
        assert_eq!(batches.len(), 2);
        assert!(batches[0].completed);
        assert!(batches[0].payout_date.is_some());
        assert_eq!(batches[0].current_count, 3);
        assert!(!batches[1].completed);
        assert_eq!(batches[1].current_count, 0);
    }

    #[test]
    fn test_next_sweep_after_release_starts_fresh() {
        let (engine, _) = test_engine(small_batches(2));
        make_eligible(&engine, "a", dec!(5000));
        make_eligible(&engine, "b", dec!(5000));
        engine.tick_batch_sweep();

        let out = engine.tick_batch_sweep().unwrap();
        assert_eq!(
            out.value,
            SweepOutcome::Pending { batch_id: 2, current_count: 0, target_size: 2 }
        );
    }

    #[test]
    fn test_sweep_is_single_flight() {
        let (engine, _) = test_engine(small_batches(2));
        let _held = engine.batches.flight.try_begin().unwrap();
        assert!(engine.tick_batch_sweep().is_none());
    }

    #[test]
    fn test_restore_keeps_ids_monotonic() {
        let done = PaymentBatch { completed: true, ..PaymentBatch::open(7, 10) };
        let coordinator = PaymentBatchCoordinator::restore(10, vec![done], 1);
        assert_eq!(coordinator.export().1, 8);
    }
}
