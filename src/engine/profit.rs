//! ProfitAccrualEngine — applies an hour-banded profit rate to active
//! traders' capital.
//!
//! Each invocation samples a fresh rate and credits
//! `trading_capital × rate` to withdrawable profit once. How often that
//! happens is purely a scheduler setting; nothing here tracks calendar
//! days.

use rust_decimal::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Applied, Engine};
use crate::config::{LedgerConfig, RateBand};
use crate::error::LedgerError;
use crate::ledger::lock;
use crate::types::{naira, Notice, Transaction, TransactionKind, UserAccount};

// ---------------------------------------------------------------------------
// Rate sampling
// ---------------------------------------------------------------------------

/// Source of the per-invocation rate within a band.
pub trait RateSampler: Send + Sync {
    /// A value in `[low, high]`.
    fn sample(&self, low: f64, high: f64) -> f64;
}

/// Uniform draw from the thread RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformSampler;

impl RateSampler for UniformSampler {
    fn sample(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        low + rand::random::<f64>() * (high - low)
    }
}

/// Deterministic sampler: always the given fraction of the way from
/// `low` to `high`.
#[derive(Debug, Clone, Copy)]
pub struct FractionSampler(pub f64);

impl RateSampler for FractionSampler {
    fn sample(&self, low: f64, high: f64) -> f64 {
        low + self.0.clamp(0.0, 1.0) * (high - low)
    }
}

/// Rate for the given local hour; zero when no band covers it.
pub fn rate_for_hour(bands: &[RateBand], hour: u32, sampler: &dyn RateSampler) -> Decimal {
    bands
        .iter()
        .find(|b| b.contains(hour))
        .and_then(|b| Decimal::from_f64(sampler.sample(b.min_rate, b.max_rate)))
        .map(|r| r.round_dp(6))
        .unwrap_or(Decimal::ZERO)
}

/// Profit for one invocation, or `None` for an inactive account or one
/// whose profit would overflow. Credits the amount to the account's
/// withdrawable profit.
pub fn accrue(
    config: &LedgerConfig,
    account: &mut UserAccount,
    hour: u32,
    sampler: &dyn RateSampler,
) -> Option<Decimal> {
    if !account.trading_active {
        return None;
    }
    let rate = rate_for_hour(&config.rate_bands, hour, sampler);
    let credited = account
        .trading_capital
        .checked_mul(rate)
        .map(|amount| amount.round_dp(2))
        .and_then(|amount| Some((amount, account.withdrawable_profit.checked_add(amount)?)));
    let Some((amount, profit)) = credited else {
        warn!(user_id = %account.id, capital = %account.trading_capital, %rate, "Profit overflows, accrual skipped");
        return None;
    };
    account.withdrawable_profit = profit;
    debug!(user_id = %account.id, %rate, %amount, "Profit accrued");
    Some(amount)
}

/// Totals of one accrual pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccrualReport {
    pub traders: usize,
    pub total: Decimal,
}

impl Engine {
    /// Accrue profit for one user. Inactive users get zero and no
    /// transaction.
    pub fn compute_daily_profit(&self, id: &str) -> Result<Applied<Decimal>, LedgerError> {
        let handle = self.require(id)?;
        let mut account = lock(&handle);
        let hour = self.clock.hour();

        match self.accrue_locked(&mut account, hour) {
            Some(amount) => {
                let notices = profit_notice(&account.id, amount).into_iter().collect();
                Ok(Applied::new(amount, notices))
            }
            None => Ok(Applied::quiet(Decimal::ZERO)),
        }
    }

    /// Accrue profit for every active trader. `None` if a previous pass is
    /// still running.
    pub fn tick_profit_accrual(&self) -> Option<Applied<AccrualReport>> {
        let _flight = self.profit_flight.try_begin()?;
        let hour = self.clock.hour();

        let mut report = AccrualReport { traders: 0, total: Decimal::ZERO };
        let mut notices = Vec::new();

        for (_, handle) in self.users.handles() {
            let mut account = lock(&handle);
            if let Some(amount) = self.accrue_locked(&mut account, hour) {
                report.traders += 1;
                report.total += amount;
                notices.extend(profit_notice(&account.id, amount));
            }
        }

        info!(
            hour,
            traders = report.traders,
            total = %report.total,
            "Profit accrual pass complete"
        );
        Some(Applied::new(report, notices))
    }

    /// Accrue and log under the caller's account lock.
    fn accrue_locked(&self, account: &mut UserAccount, hour: u32) -> Option<Decimal> {
        let amount = accrue(&self.config, account, hour, self.sampler.as_ref())?;
        self.transactions.append(Transaction::completed(
            &account.id,
            amount,
            TransactionKind::Profit,
            self.clock.now_utc(),
        ));
        Some(amount)
    }
}

fn profit_notice(user_id: &str, amount: Decimal) -> Option<Notice> {
    (amount > Decimal::ZERO).then(|| {
        Notice::new(
            user_id,
            format!("💰 AI Trading Update: You earned {} profit!", naira(amount)),
        )
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
