use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use refledger::config::LedgerConfig;
use refledger::engine::batch::SweepOutcome;
use refledger::storage::LedgerSnapshot;
use refledger::types::{Transaction, TransactionKind};

use crate::common::{activate, engine_with};

const TRADERS: usize = 12;

/// Accruals, verifications and sweeps racing each other must never lose
/// or double-pay money: for every account, credited profit minus paid
/// out withdrawals equals what is still withdrawable.
#[test]
fn test_money_is_conserved_under_concurrent_sweeps() {
    let config = LedgerConfig { batch_target_size: 4, ..LedgerConfig::default() };
    let (engine, _) = engine_with(config);
    let engine = Arc::new(engine);

    let ids: Vec<String> = (0..TRADERS).map(|n| format!("t{n:02}")).collect();
    for id in &ids {
        activate(&engine, id);
    }

    let mut workers = Vec::new();
    for id in ids.clone() {
        let engine = Arc::clone(&engine);
        workers.push(thread::spawn(move || {
            for round in 0..5 {
                engine.compute_daily_profit(&id).unwrap();
                if round == 2 {
                    engine.confirm_verification(&id).unwrap();
                }
            }
        }));
    }
    for _ in 0..3 {
        let engine = Arc::clone(&engine);
        workers.push(thread::spawn(move || {
            for _ in 0..10 {
                engine.tick_batch_sweep();
                engine.tick_profit_accrual();
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    let net = net_by_user(&engine.transactions().all());

    for id in &ids {
        let account = engine.user(id).unwrap();
        assert!(account.verified);
        assert_eq!(
            engine.transactions().count(id, TransactionKind::VerificationCredit),
            1
        );
        assert_eq!(net[id], account.withdrawable_profit, "account {id}");
    }
}

#[test]
fn test_concurrent_sweeps_release_each_batch_once() {
    let config = LedgerConfig { batch_target_size: 3, ..LedgerConfig::default() };
    let (engine, _) = engine_with(config);
    let engine = Arc::new(engine);
    for id in ["a", "b", "c"] {
        crate::common::eligible(&engine, id, dec!(5000));
    }

    let sweeps: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.tick_batch_sweep().map(|a| a.value))
        })
        .collect();
    let released = sweeps
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .filter(|out| matches!(out, SweepOutcome::Released { .. }))
        .count();

    assert_eq!(released, 1);
    assert_eq!(engine.transactions().of_kind(TransactionKind::Withdrawal).len(), 3);
}

/// Per-user profit credits minus withdrawals in a transaction list.
fn net_by_user(txs: &[Transaction]) -> BTreeMap<String, Decimal> {
    let mut net = BTreeMap::new();
    for tx in txs {
        let signed = match tx.kind {
            TransactionKind::Profit | TransactionKind::VerificationCredit => tx.amount,
            TransactionKind::Withdrawal => -tx.amount,
            _ => continue,
        };
        *net.entry(tx.user_id.clone()).or_insert(Decimal::ZERO) += signed;
    }
    net
}

/// Withdrawable profit not explained by the log, per user. A sweep moves
/// profit and log entries together, so this never changes in a
/// consistent snapshot.
fn unexplained(snapshot: &LedgerSnapshot) -> BTreeMap<String, Decimal> {
    let net = net_by_user(&snapshot.transactions);
    snapshot
        .users
        .iter()
        .map(|a| {
            let logged = net.get(&a.id).copied().unwrap_or_default();
            (a.id.clone(), a.withdrawable_profit - logged)
        })
        .collect()
}

#[test]
fn test_snapshot_is_a_consistent_cut_during_sweep() {
    const MEMBERS: usize = 400;
    let config = LedgerConfig { batch_target_size: MEMBERS as u32, ..LedgerConfig::default() };
    let (engine, _) = engine_with(config);
    let engine = Arc::new(engine);
    for n in 0..MEMBERS {
        crate::common::eligible(&engine, &format!("m{n:03}"), dec!(6000));
    }
    let baseline = unexplained(&engine.snapshot());

    let sweeper = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.tick_batch_sweep().map(|a| a.value))
    };
    let mut snapshots: Vec<LedgerSnapshot> = (0..50).map(|_| engine.snapshot()).collect();
    let outcome = sweeper.join().unwrap();
    assert!(matches!(outcome, Some(SweepOutcome::Released { .. })));
    snapshots.push(engine.snapshot());

    for snapshot in &snapshots {
        assert_eq!(unexplained(snapshot), baseline);

        let released = snapshot.batches.iter().any(|b| b.completed);
        let withdrawals = snapshot
            .transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Withdrawal)
            .count();
        assert_eq!(withdrawals, if released { MEMBERS } else { 0 });
    }
}
