//! Promotional reminder sweep, at most once per local hour.

use chrono::NaiveDate;
use std::sync::Mutex;
use tracing::{debug, info};

use super::{Applied, Engine};
use crate::config::LedgerConfig;
use crate::ledger::lock;
use crate::scheduler::SingleFlight;
use crate::types::{naira, Notice, PaymentBatch, UserAccount};

/// Local hours, both ends inclusive, in which ad reminders go out.
const AD_REMINDER_HOURS: std::ops::RangeInclusive<u32> = 8..=20;

#[derive(Default)]
pub struct ReminderState {
    last_run: Mutex<Option<(NaiveDate, u32)>>,
    flight: SingleFlight,
}

/// Reminders owed to one account at `hour`.
pub fn reminders_for(
    config: &LedgerConfig,
    account: &UserAccount,
    hour: u32,
    open_batch: &PaymentBatch,
) -> Vec<Notice> {
    let mut out = Vec::new();

    if !account.trading_active && AD_REMINDER_HOURS.contains(&hour) {
        let left = config.ads_required.saturating_sub(account.ads_watched_today);
        out.push(Notice::new(
            &account.id,
            format!("📺 Watch {left} more ads today to keep your AI trading on track!"),
        ));
    }

    if hour % 3 == 0 {
        out.push(Notice::new(
            &account.id,
            format!(
                "🎮 Your games are ready! Win rewards to grow your {} trading capital.",
                naira(account.trading_capital)
            ),
        ));
    }

    if account.withdrawable_profit >= config.payout_threshold {
        let message = if account.verified {
            format!(
                "📦 Payment batch #{} is {:.1}% full ({}/{}). Your {} is queued for payout.",
                open_batch.id,
                open_batch.progress_pct(),
                open_batch.current_count,
                open_batch.target_size,
                naira(account.withdrawable_profit)
            )
        } else {
            format!(
                "🔐 You have {} ready to withdraw. Verify your account to join the next payment batch!",
                naira(account.withdrawable_profit)
            )
        };
        out.push(Notice::new(&account.id, message));
    }

    out
}

impl Engine {
    /// Queue reminders for every user. Returns the number of notices, or
    /// `None` if a sweep is already running. A second call within the same
    /// local hour yields zero notices.
    pub fn tick_reminders(&self) -> Option<Applied<usize>> {
        let _flight = self.reminders.flight.try_begin()?;
        let slot = (self.clock.today(), self.clock.hour());

        {
            let mut last = lock(&self.reminders.last_run);
            if *last == Some(slot) {
                debug!(hour = slot.1, "Reminders already sent this hour");
                return Some(Applied::quiet(0));
            }
            *last = Some(slot);
        }

        // Batch book before any account lock.
        let open_batch = self.open_batch();

        let mut notices = Vec::new();
        for (_, handle) in self.users.handles() {
            let account = lock(&handle);
            notices.extend(reminders_for(&self.config, &account, slot.1, &open_batch));
        }

        info!(hour = slot.1, notices = notices.len(), "Reminder sweep complete");
        Some(Applied::new(notices.len(), notices))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
