//! StreakBonus — escalating, capped bonus for consecutive daily logins.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use super::{Applied, Engine};
use crate::config::LedgerConfig;
use crate::ledger::lock;
use crate::types::{naira, Notice, Transaction, TransactionKind, UserAccount};

/// `min(base + step × (n − 1), cap)`. A count of zero pays the base.
pub fn streak_bonus(config: &LedgerConfig, streak_count: u32) -> Decimal {
    let steps = Decimal::from(streak_count.saturating_sub(1));
    (config.streak_base_bonus + config.streak_step_bonus * steps).min(config.streak_bonus_cap)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StreakOutcome {
    Awarded { streak_count: u32, bonus: Decimal },
    AlreadyClaimedToday,
}

/// Advance the streak for a login on `today` and credit the bonus to the
/// balance. Does nothing if the bonus was already claimed today.
pub fn apply_login(config: &LedgerConfig, account: &mut UserAccount, today: NaiveDate) -> StreakOutcome {
    if account.streak_last_login == Some(today) {
        return StreakOutcome::AlreadyClaimedToday;
    }

    let continued = account
        .streak_last_login
        .and_then(|last| last.succ_opt())
        .is_some_and(|next| next == today);
    account.streak_count = if continued { account.streak_count + 1 } else { 1 };
    account.streak_last_login = Some(today);

    let bonus = streak_bonus(config, account.streak_count);
    account.balance += bonus;
    StreakOutcome::Awarded { streak_count: account.streak_count, bonus }
}

/// What a session start returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStart {
    pub account: UserAccount,
    pub created: bool,
    pub streak: StreakOutcome,
}

impl Engine {
    /// Create-or-get the user and apply today's streak bonus.
    pub fn start_session(&self, id: &str) -> Applied<SessionStart> {
        let created = self.create_or_get_user(id);
        let mut notices = created.notices;
        let (_, is_new) = created.value;

        let (handle, _) = self.account_handle(id);
        let mut account = lock(&handle);
        let today = self.clock.today();

        let streak = apply_login(&self.config, &mut account, today);
        match streak {
            StreakOutcome::Awarded { streak_count, bonus } => {
                self.transactions.append(
                    Transaction::completed(id, bonus, TransactionKind::StreakBonus, self.clock.now_utc())
                        .with_description(format!("day {streak_count} streak")),
                );
                info!(user_id = %id, streak_count, bonus = %bonus, "Streak bonus credited");
                notices.push(Notice::new(
                    id,
                    format!("🔥 Day {streak_count} login streak! {} added to your balance.", naira(bonus)),
                ));
            }
            StreakOutcome::AlreadyClaimedToday => {
                debug!(user_id = %id, "Streak bonus already claimed today");
            }
        }

        let value = SessionStart { account: account.clone(), created: is_new, streak };
        Applied::new(value, notices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
