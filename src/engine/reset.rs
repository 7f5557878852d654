//! DailyResetScheduler — clears daily counters once per local calendar day.
//!
//! The last reset date is remembered, so the task can be polled as often
//! as needed: repeated ticks within a day are no-ops and a missed
//! midnight is caught up on the first tick after it.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{Applied, Engine};
use crate::ledger::lock;
use crate::scheduler::SingleFlight;
use crate::types::{Notice, UserAccount};
use std::collections::BTreeMap;

pub struct DailyResetScheduler {
    last_reset: Mutex<NaiveDate>,
    flight: SingleFlight,
}

impl DailyResetScheduler {
    pub fn new(last_reset: NaiveDate) -> Self {
        Self {
            last_reset: Mutex::new(last_reset),
            flight: SingleFlight::new(),
        }
    }

    /// Hold the reset date; a daily reset cannot start until it is released.
    pub(super) fn hold(&self) -> MutexGuard<'_, NaiveDate> {
        lock(&self.last_reset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResetOutcome {
    Reset { date: NaiveDate, users: usize, deactivated: usize },
    AlreadyRanToday { date: NaiveDate },
}

/// Reset one account's daily state. Returns true if it was trading.
pub fn reset_account(account: &mut UserAccount, quotas: &BTreeMap<String, u32>) -> bool {
    let was_active = account.trading_active;
    account.ads_watched_today = 0;
    account.trading_active = false;
    account.game_attempts = quotas.clone();
    was_active
}

impl Engine {
    /// Run the daily reset if the local date moved past the last reset.
    /// `None` if a previous reset is still running.
    pub fn tick_daily_reset(&self) -> Option<Applied<ResetOutcome>> {
        let _flight = self.reset.flight.try_begin()?;
        let today = self.clock.today();
        let mut last = lock(&self.reset.last_reset);

        if today <= *last {
            debug!(%today, last = %*last, "Daily reset already ran");
            return Some(Applied::quiet(ResetOutcome::AlreadyRanToday { date: *last }));
        }

        let mut users = 0;
        let mut notices = Vec::new();
        for (_, handle) in self.users.handles() {
            let mut account = lock(&handle);
            users += 1;
            if reset_account(&mut account, &self.config.game_quotas) {
                notices.push(Notice::new(
                    &account.id,
                    format!(
                        "⏳ Trading has been reset for the day. Watch {} ads to activate trading again!",
                        self.config.ads_required
                    ),
                ));
            }
        }
        *last = today;

        let deactivated = notices.len();
        info!(%today, users, deactivated, "Daily reset complete");
        Some(Applied::new(ResetOutcome::Reset { date: today, users, deactivated }, notices))
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
    use chrono::{Duration, TimeZone};
    use chrono_tz::Africa::Lagos;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_reset_on_the_starting_day() {
        let (engine, _) = test_engine(LedgerConfig::default());
        let out = engine.tick_daily_reset().unwrap();
        assert_eq!(out.value, ResetOutcome::AlreadyRanToday { date: date(2026, 3, 2) });
    }

    #[test]
    fn test_reset_after_midnight_then_noop() {
        let (engine, clock) = test_engine(LedgerConfig::default());
        engine.create_or_get_user("a");
        engine.create_or_get_user("b");
        engine.users().update("a", |a| {
            a.ads_watched_today = 23;
            a.trading_active = true;
            a.game_attempts.insert("trivia".to_string(), 0);
        });
        engine.users().update("b", |a| a.ads_watched_today = 4);

        clock.set(Lagos.with_ymd_and_hms(2026, 3, 3, 0, 1, 0).unwrap());
        let out = engine.tick_daily_reset().unwrap();
        assert_eq!(
            out.value,
            ResetOutcome::Reset { date: date(2026, 3, 3), users: 2, deactivated: 1 }
        );
        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].user_id, "a");

        let a = engine.user("a").unwrap();
        assert_eq!(a.ads_watched_today, 0);
        assert!(!a.trading_active);
        assert_eq!(a.game_attempts.get("trivia"), Some(&3));
        assert_eq!(engine.user("b").unwrap().ads_watched_today, 0);

        // Later the same day: nothing happens
        engine.users().update("b", |a| a.ads_watched_today = 2);
        clock.advance(Duration::hours(20));
        let again = engine.tick_daily_reset().unwrap();
        assert_eq!(again.value, ResetOutcome::AlreadyRanToday { date: date(2026, 3, 3) });
        assert_eq!(engine.user("b").unwrap().ads_watched_today, 2);
    }

    #[test]
    fn test_missed_days_reset_once() {
        let (engine, clock) = test_engine(LedgerConfig::default());
        engine.create_or_get_user("a");
        clock.advance(Duration::days(3));

        let out = engine.tick_daily_reset().unwrap();
        assert!(matches!(out.value, ResetOutcome::Reset { .. }));
        assert!(matches!(
            engine.tick_daily_reset().unwrap().value,
            ResetOutcome::AlreadyRanToday { .. }
        ));
    }

    #[test]
    fn test_reset_uses_local_calendar_day() {
        let (engine, clock) = test_engine(LedgerConfig::default());
        // 23:30 UTC on the 2nd is already 00:30 on the 3rd in Lagos
        clock.set(chrono::Utc.with_ymd_and_hms(2026, 3, 2, 23, 30, 0).unwrap().with_timezone(&Lagos));
        let out = engine.tick_daily_reset().unwrap();
        assert!(matches!(out.value, ResetOutcome::Reset { date: d, .. } if d == date(2026, 3, 3)));
    }

    #[test]
    fn test_reset_is_single_flight() {
        let (engine, _) = test_engine(LedgerConfig::default());
        let _held = engine.reset.flight.try_begin().unwrap();
        assert!(engine.tick_daily_reset().is_none());
    }
}
