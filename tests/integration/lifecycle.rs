use chrono::{Duration, TimeZone};
use chrono_tz::Africa::Lagos;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use refledger::config::LedgerConfig;
use refledger::engine::batch::SweepOutcome;
use refledger::engine::referral::{IgnoreReason, ReferralOutcome};
use refledger::engine::reset::ResetOutcome;
use refledger::engine::streak::StreakOutcome;
use refledger::error::LedgerError;
use refledger::types::TransactionKind;

use crate::common::{activate, eligible, engine, engine_with};

#[test]
fn test_full_referrals_give_35000_capital() {
    let (engine, _) = engine();
    activate(&engine, "R");

    let account = engine.user("R").unwrap();
    assert_eq!(account.referrals_count, 6);
    assert_eq!(account.trading_capital, dec!(35000));
    assert_eq!(account.balance, dec!(35000));
    assert!(!account.referral_bonus_eligible);
    assert_eq!(
        engine.transactions().count("R", TransactionKind::ReferralBonus),
        6
    );

    // A seventh referral changes nothing.
    let out = engine.apply_referral("R", "R-ref-late").unwrap();
    assert_eq!(
        out.value,
        ReferralOutcome::Ignored { reason: IgnoreReason::BonusCapReached }
    );
    assert_eq!(engine.user("R").unwrap().trading_capital, dec!(35000));
}

#[test]
fn test_profit_on_full_capital() {
    let (engine, _) = engine();
    activate(&engine, "R");

    // 10:00 falls in the 08–16 band, lower bound 0.21.
    let profit = engine.compute_daily_profit("R").unwrap();
    assert_eq!(profit.value, dec!(7350));
    assert_eq!(profit.notices.len(), 1);
    assert_eq!(engine.user("R").unwrap().withdrawable_profit, dec!(7350));
}

#[test]
fn test_inactive_user_earns_nothing() {
    let (engine, _) = engine();
    engine.create_or_get_user("idle");

    let profit = engine.compute_daily_profit("idle").unwrap();
    assert_eq!(profit.value, Decimal::ZERO);
    assert!(profit.notices.is_empty());
    assert_eq!(engine.transactions().count("idle", TransactionKind::Profit), 0);
    assert_eq!(engine.user("idle").unwrap().withdrawable_profit, Decimal::ZERO);
}

#[test]
fn test_self_and_unknown_referrals_rejected() {
    let (engine, _) = engine();
    engine.create_or_get_user("a");
    assert_eq!(
        engine.apply_referral("a", "a").unwrap_err(),
        LedgerError::SelfReferral("a".to_string())
    );
    assert_eq!(
        engine.apply_referral("ghost", "b").unwrap_err(),
        LedgerError::UnknownUser("ghost".to_string())
    );
    assert!(!engine.users().contains("b"));
}

#[test]
fn test_batch_releases_at_target() {
    let config = LedgerConfig { batch_target_size: 1000, ..LedgerConfig::default() };
    let (engine, _) = engine_with(config);
    for n in 0..999 {
        eligible(&engine, &format!("u{n:04}"), dec!(5000));
    }

    let out = engine.tick_batch_sweep().unwrap();
    assert_eq!(
        out.value,
        SweepOutcome::Pending { batch_id: 1, current_count: 999, target_size: 1000 }
    );
    assert_eq!(engine.transactions().of_kind(TransactionKind::Withdrawal).len(), 0);

    eligible(&engine, "u0999", dec!(6200));
    let out = engine.tick_batch_sweep().unwrap();
    let SweepOutcome::Released { batch_id, settlements, next_batch_id, .. } = out.value else {
        panic!("expected the batch to release");
    };
    assert_eq!(batch_id, 1);
    assert_eq!(next_batch_id, 2);
    assert_eq!(settlements.len(), 1000);
    assert_eq!(out.notices.len(), 1000);

    let withdrawals = engine.transactions().of_kind(TransactionKind::Withdrawal);
    assert_eq!(withdrawals.len(), 1000);
    let total: Decimal = withdrawals.iter().map(|t| t.amount).sum();
    assert_eq!(total, dec!(5000) * dec!(999) + dec!(6200));
    assert!(engine
        .users()
        .snapshot_all()
        .iter()
        .all(|a| a.withdrawable_profit == Decimal::ZERO));

    let fresh = engine.open_batch();
    assert_eq!(fresh.id, 2);
    assert_eq!(fresh.current_count, 0);
    assert!(!fresh.completed);
}

#[test]
fn test_daily_reset_runs_once_per_local_day() {
    let (engine, clock) = engine();
    activate(&engine, "R");

    clock.set(Lagos.with_ymd_and_hms(2026, 3, 3, 0, 0, 30).unwrap());
    let first = engine.tick_daily_reset().unwrap();
    assert_eq!(
        first.value,
        ResetOutcome::Reset {
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            users: 7,
            deactivated: 1,
        }
    );
    assert_eq!(first.notices.len(), 1);

    let account = engine.user("R").unwrap();
    assert!(!account.trading_active);
    assert_eq!(account.ads_watched_today, 0);
    assert_eq!(account.trading_capital, dec!(35000));

    clock.advance(Duration::hours(5));
    let second = engine.tick_daily_reset().unwrap();
    assert!(matches!(second.value, ResetOutcome::AlreadyRanToday { .. }));
    assert!(second.notices.is_empty());
}

#[test]
fn test_reactivation_keeps_capital() {
    let (engine, clock) = engine();
    activate(&engine, "R");
    clock.advance(Duration::days(1));
    engine.tick_daily_reset();

    for _ in 0..20 {
        engine.record_ad_watch("R").unwrap();
    }
    let account = engine.user("R").unwrap();
    assert!(account.trading_active);
    assert_eq!(account.trading_capital, dec!(35000));
}

#[test]
fn test_streak_progression() {
    let (engine, clock) = engine();
    let mut bonuses = Vec::new();
    for _ in 0..9 {
        match engine.start_session("s").value.streak {
            StreakOutcome::Awarded { bonus, .. } => bonuses.push(bonus),
            StreakOutcome::AlreadyClaimedToday => panic!("first login of the day"),
        }
        assert_eq!(
            engine.start_session("s").value.streak,
            StreakOutcome::AlreadyClaimedToday
        );
        clock.advance(Duration::days(1));
    }
    assert_eq!(
        bonuses,
        vec![
            dec!(500), dec!(600), dec!(700), dec!(800), dec!(900),
            dec!(1000), dec!(1100), dec!(1100), dec!(1100),
        ]
    );
    assert_eq!(engine.transactions().count("s", TransactionKind::StreakBonus), 9);
}

#[test]
fn test_missed_day_restarts_streak() {
    let (engine, clock) = engine();
    engine.start_session("s");
    clock.advance(Duration::days(1));
    engine.start_session("s");
    clock.advance(Duration::days(2));

    let out = engine.start_session("s").value.streak;
    assert_eq!(out, StreakOutcome::Awarded { streak_count: 1, bonus: dec!(500) });
}
