//! TradingActivationGate — Inactive → Active when both the referral and
//! the daily ad-watch requirements hold.
//!
//! Activation never touches trading capital: capital is maintained
//! incrementally (signup grant + one grant per referral + game rewards).
//! Active → Inactive only happens in the daily reset.

use serde::Serialize;
use std::fmt;
use tracing::info;

use super::{Applied, Engine};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ledger::lock;
use crate::types::{naira, Notice, TradingState, UserAccount};

/// An activation precondition the account does not meet yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "requirement", rename_all = "snake_case")]
pub enum Requirement {
    Referrals { have: u32, need: u32 },
    AdsWatched { have: u32, need: u32 },
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Referrals { have, need } => write!(f, "referrals {have}/{need}"),
            Requirement::AdsWatched { have, need } => write!(f, "ads watched today {have}/{need}"),
        }
    }
}

/// Requirements `account` still misses; empty means it may trade.
pub fn unmet_requirements(config: &LedgerConfig, account: &UserAccount) -> Vec<Requirement> {
    let mut unmet = Vec::new();
    if account.referrals_count < config.max_referrals {
        unmet.push(Requirement::Referrals {
            have: account.referrals_count,
            need: config.max_referrals,
        });
    }
    if account.ads_watched_today < config.ads_required {
        unmet.push(Requirement::AdsWatched {
            have: account.ads_watched_today,
            need: config.ads_required,
        });
    }
    unmet
}

/// Flip an inactive account to active if the precondition holds right now.
/// Returns true only when this call made the transition.
pub fn try_activate(config: &LedgerConfig, account: &mut UserAccount) -> bool {
    if account.trading_active || !unmet_requirements(config, account).is_empty() {
        return false;
    }
    account.trading_active = true;
    info!(
        user_id = %account.id,
        capital = %account.trading_capital,
        referrals = account.referrals_count,
        ads = account.ads_watched_today,
        "Trading activated"
    );
    true
}

pub(crate) fn activation_notice(account: &UserAccount) -> Notice {
    Notice::new(
        &account.id,
        format!(
            "🎉 AI Trading Activated! Your trading capital is {}",
            naira(account.trading_capital)
        ),
    )
}

/// Result of one ad view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdWatch {
    pub ads_watched_today: u32,
    pub activated: bool,
}

impl Engine {
    /// Count one watched ad and re-check the activation gate.
    pub fn record_ad_watch(&self, id: &str) -> Result<Applied<AdWatch>, LedgerError> {
        let handle = self.require(id)?;
        let mut account = lock(&handle);

        account.ads_watched_today += 1;
        account.last_ad_watch = Some(self.clock.now_utc());
        let activated = try_activate(&self.config, &mut account);

        let value = AdWatch {
            ads_watched_today: account.ads_watched_today,
            activated,
        };
        let notices = if activated { vec![activation_notice(&account)] } else { Vec::new() };
        Ok(Applied::new(value, notices))
    }

    /// Explicit request to start trading. Refused, with every unmet
    /// requirement listed, unless the full precondition holds. Already
    /// active accounts stay active.
    pub fn request_trading_toggle(&self, id: &str) -> Result<Applied<TradingState>, LedgerError> {
        let handle = self.require(id)?;
        let mut account = lock(&handle);

        if account.trading_active {
            return Ok(Applied::quiet(TradingState::Active));
        }

        let unmet = unmet_requirements(&self.config, &account);
        if !unmet.is_empty() {
            return Err(LedgerError::ActivationRequirementsUnmet { unmet });
        }

        try_activate(&self.config, &mut account);
        Ok(Applied::new(TradingState::Active, vec![activation_notice(&account)]))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
