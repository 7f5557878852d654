//! LedgerService — the engine plus its outbound collaborators.
//!
//! Every operation runs against the engine first; only once the engine
//! has returned (and every account lock is released) are the resulting
//! notices dispatched and web-app sync calls issued. Both are
//! fire-and-forget with a bounded timeout.

use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::engine::activation::AdWatch;
use crate::engine::admin::LedgerStats;
use crate::engine::batch::SweepOutcome;
use crate::engine::profit::AccrualReport;
use crate::engine::referral::ReferralOutcome;
use crate::engine::reset::ResetOutcome;
use crate::engine::streak::SessionStart;
use crate::engine::verification::VerificationOutcome;
use crate::engine::{Applied, Engine};
use crate::error::LedgerError;
use crate::notify::sync::UserSync;
use crate::notify::Dispatcher;
use crate::storage;
use crate::types::{GameStats, PaymentBatch, TradingState, Transaction, UserAccount};

/// Concurrent pushes during a full sync.
const SYNC_ALL_IN_FLIGHT: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pushed: usize,
    pub failed: usize,
}

pub struct LedgerService {
    engine: Arc<Engine>,
    dispatcher: Dispatcher,
    sync: Arc<dyn UserSync>,
    sync_timeout: Duration,
}

impl LedgerService {
    pub fn new(
        engine: Arc<Engine>,
        dispatcher: Dispatcher,
        sync: Arc<dyn UserSync>,
        sync_timeout: Duration,
    ) -> Self {
        Self { engine, dispatcher, sync, sync_timeout }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn deliver<T>(&self, applied: Applied<T>) -> T {
        self.dispatcher.dispatch(applied.notices);
        applied.value
    }

    fn push_user(&self, account: UserAccount) {
        let sync = Arc::clone(&self.sync);
        spawn_best_effort("user sync", self.sync_timeout, async move {
            sync.push_user(&account).await
        });
    }

    // -- User operations --------------------------------------------------

    pub fn create_or_get_user(&self, id: &str) -> (UserAccount, bool) {
        self.deliver(self.engine.create_or_get_user(id))
    }

    pub fn start_session(&self, id: &str) -> SessionStart {
        let session = self.deliver(self.engine.start_session(id));
        self.push_user(session.account.clone());
        session
    }

    pub fn apply_referral(&self, referrer_id: &str, referred_id: &str) -> Result<ReferralOutcome, LedgerError> {
        let outcome = self.deliver(self.engine.apply_referral(referrer_id, referred_id)?);
        if matches!(outcome, ReferralOutcome::Credited { .. }) {
            let sync = Arc::clone(&self.sync);
            let (referrer, referred) = (referrer_id.to_string(), referred_id.to_string());
            spawn_best_effort("referral sync", self.sync_timeout, async move {
                sync.track_referral(&referrer, &referred).await
            });
        }
        Ok(outcome)
    }

    pub fn record_ad_watch(&self, id: &str) -> Result<AdWatch, LedgerError> {
        Ok(self.deliver(self.engine.record_ad_watch(id)?))
    }

    pub fn confirm_verification(&self, id: &str) -> Result<VerificationOutcome, LedgerError> {
        let outcome = self.deliver(self.engine.confirm_verification(id)?);
        if let VerificationOutcome::Verified { .. } = outcome {
            self.push_user(self.engine.user(id)?);
        }
        Ok(outcome)
    }

    pub fn request_trading_toggle(&self, id: &str) -> Result<TradingState, LedgerError> {
        Ok(self.deliver(self.engine.request_trading_toggle(id)?))
    }

    pub fn record_game_reward(&self, id: &str, game_id: &str, reward: Decimal) -> Result<GameStats, LedgerError> {
        Ok(self.deliver(self.engine.record_game_reward(id, game_id, reward)?))
    }

    pub fn compute_daily_profit(&self, id: &str) -> Result<Decimal, LedgerError> {
        Ok(self.deliver(self.engine.compute_daily_profit(id)?))
    }

    // -- Queries ----------------------------------------------------------

    pub fn user(&self, id: &str) -> Result<UserAccount, LedgerError> {
        self.engine.user(id)
    }

    pub fn transactions_for(&self, id: &str) -> Result<Vec<Transaction>, LedgerError> {
        self.engine.require(id)?;
        Ok(self.engine.transactions_for(id))
    }

    pub fn open_batch(&self) -> PaymentBatch {
        self.engine.open_batch()
    }

    pub fn stats(&self) -> LedgerStats {
        self.engine.stats()
    }

    // -- Periodic tasks ---------------------------------------------------

    pub fn tick_profit_accrual(&self) -> Option<AccrualReport> {
        self.engine.tick_profit_accrual().map(|a| self.deliver(a))
    }

    pub fn tick_daily_reset(&self) -> Option<ResetOutcome> {
        self.engine.tick_daily_reset().map(|a| self.deliver(a))
    }

    pub fn tick_batch_sweep(&self) -> Option<SweepOutcome> {
        self.engine.tick_batch_sweep().map(|a| self.deliver(a))
    }

    pub fn tick_reminders(&self) -> Option<usize> {
        self.engine.tick_reminders().map(|a| self.deliver(a))
    }

    // -- Admin ------------------------------------------------------------

    pub fn begin_announcement(&self, admin_id: &str) -> Result<chrono::DateTime<chrono::Utc>, LedgerError> {
        self.engine.begin_announcement(admin_id)
    }

    pub fn submit_announcement(&self, admin_id: &str, text: &str) -> Result<usize, LedgerError> {
        Ok(self.deliver(self.engine.submit_announcement(admin_id, text)?))
    }

    pub fn cancel_announcement(&self, admin_id: &str) -> Result<bool, LedgerError> {
        self.engine.cancel_announcement(admin_id)
    }

    /// Push every account to the web app and wait for the result.
    pub async fn sync_all(&self, admin_id: &str) -> Result<SyncReport, LedgerError> {
        self.engine.authorize_admin(admin_id)?;
        // Copying accounts waits on their locks, which a sweep may hold.
        let engine = Arc::clone(&self.engine);
        let accounts = match tokio::task::spawn_blocking(move || engine.users().snapshot_all()).await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(error = %e, "Account export failed, nothing synced");
                Vec::new()
            }
        };
        let total = accounts.len();

        let outcomes: Vec<bool> = stream::iter(accounts)
            .map(|account| async move {
                match tokio::time::timeout(self.sync_timeout, self.sync.push_user(&account)).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        warn!(user_id = %account.id, error = %e, "User sync failed");
                        false
                    }
                    Err(_) => {
                        warn!(user_id = %account.id, "User sync timed out");
                        false
                    }
                }
            })
            .buffer_unordered(SYNC_ALL_IN_FLIGHT)
            .collect()
            .await;

        let pushed = outcomes.iter().filter(|ok| **ok).count();
        let report = SyncReport { pushed, failed: total - pushed };
        info!(admin_id, pushed = report.pushed, failed = report.failed, "Full user sync complete");
        Ok(report)
    }

    // -- Persistence ------------------------------------------------------

    pub fn save_snapshot(&self, path: &str) -> anyhow::Result<()> {
        storage::save_snapshot(&self.engine.snapshot(), path)
    }
}

/// Run `call` in the background with a timeout, logging any failure.
fn spawn_best_effort<F>(what: &'static str, timeout: Duration, call: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!(what, "No runtime available, external call skipped");
        return;
    };
    handle.spawn(async move {
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(what, error = %e, "External call failed"),
            Err(_) => warn!(what, timeout_ms = timeout.as_millis() as u64, "External call timed out"),
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
