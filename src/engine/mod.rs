//! Core engine — the single synchronization boundary around the ledger.
//!
//! `Engine` owns the account table, the transaction log, the batch book
//! and the scheduler state. Every operation mutates accounts under their
//! per-user locks and returns the notices it produced; delivering them is
//! the caller's job, after all locks are released.
//!
//! Components live in submodules as `impl Engine` blocks next to their
//! pure rule functions.

pub mod activation;
pub mod admin;
pub mod batch;
pub mod games;
pub mod profit;
pub mod referral;
pub mod reminders;
pub mod reset;
pub mod streak;
pub mod verification;

use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::config::{AdminConfig, LedgerConfig};
use crate::error::LedgerError;
use crate::ledger::{lock, AccountHandle, TransactionLedger, UserLedger};
use crate::scheduler::SingleFlight;
use crate::storage::LedgerSnapshot;
use crate::types::{naira, Notice, Transaction, UserAccount};

use admin::AdminConsole;
use batch::PaymentBatchCoordinator;
use profit::RateSampler;
use reminders::ReminderState;
use reset::DailyResetScheduler;

// ---------------------------------------------------------------------------
// Operation result
// ---------------------------------------------------------------------------

/// The value of an operation plus the notices it wants delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub value: T,
    pub notices: Vec<Notice>,
}

impl<T> Applied<T> {
    pub fn new(value: T, notices: Vec<Notice>) -> Self {
        Self { value, notices }
    }

    /// No notices.
    pub fn quiet(value: T) -> Self {
        Self { value, notices: Vec::new() }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Applied<U> {
        Applied { value: f(self.value), notices: self.notices }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    sampler: Arc<dyn RateSampler>,
    users: UserLedger,
    transactions: TransactionLedger,
    batches: PaymentBatchCoordinator,
    reset: DailyResetScheduler,
    reminders: ReminderState,
    admin: AdminConsole,
    profit_flight: SingleFlight,
}

impl Engine {
    /// Fresh, empty ledger. The current local day counts as already reset.
    pub fn new(config: LedgerConfig, clock: Arc<dyn Clock>, sampler: Arc<dyn RateSampler>) -> Self {
        let today = clock.today();
        let batches = PaymentBatchCoordinator::new(config.batch_target_size);
        Self {
            config,
            clock,
            sampler,
            users: UserLedger::new(),
            transactions: TransactionLedger::new(),
            batches,
            reset: DailyResetScheduler::new(today),
            reminders: ReminderState::default(),
            admin: AdminConsole::new(&AdminConfig::default()),
            profit_flight: SingleFlight::new(),
        }
    }

    pub fn with_admin(mut self, admin: &AdminConfig) -> Self {
        self.admin = AdminConsole::new(admin);
        self
    }

    /// Replace the in-memory state with a snapshot.
    pub fn restore(mut self, snapshot: LedgerSnapshot) -> Self {
        info!(
            users = snapshot.users.len(),
            transactions = snapshot.transactions.len(),
            batches = snapshot.batches.len(),
            "Restoring ledger from snapshot"
        );
        self.users = UserLedger::restore(snapshot.users);
        self.transactions = TransactionLedger::restore(snapshot.transactions);
        self.batches = PaymentBatchCoordinator::restore(
            self.config.batch_target_size,
            snapshot.batches,
            snapshot.next_batch_id,
        );
        if let Some(date) = snapshot.last_reset_date {
            self.reset = DailyResetScheduler::new(date);
        }
        self
    }

    /// Export the full state as one consistent cut. Holds the reset date,
    /// the batch book and every account for the duration, in lock order,
    /// so no operation can be half applied in the result.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let last_reset = self.reset.hold();
        self.batches.frozen(|batches, next_batch_id| {
            self.users.with_all_locked(|accounts| LedgerSnapshot {
                users: accounts.iter().map(|a| UserAccount::clone(a)).collect(),
                transactions: self.transactions.all(),
                batches: batches.to_vec(),
                next_batch_id,
                last_reset_date: Some(*last_reset),
            })
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn users(&self) -> &UserLedger {
        &self.users
    }

    pub fn transactions(&self) -> &TransactionLedger {
        &self.transactions
    }

    // -- Accounts ---------------------------------------------------------

    /// Fetch an account, creating it with the configured seed values on
    /// first interaction. New accounts get a welcome notice.
    pub fn create_or_get_user(&self, id: &str) -> Applied<(UserAccount, bool)> {
        let (handle, created) = self.account_handle(id);
        let account = lock(&handle).clone();

        if !created {
            return Applied::quiet((account, false));
        }

        info!(user_id = %id, balance = %account.balance, "New account created");
        let welcome = Notice::new(
            id,
            format!(
                "Welcome! Your starting balance is {}. Get {} referrals and watch {} ads today to unlock AI trading.",
                naira(account.balance),
                self.config.max_referrals,
                self.config.ads_required,
            ),
        );
        Applied::new((account, true), vec![welcome])
    }

    /// Consistent copy of one account.
    pub fn user(&self, id: &str) -> Result<UserAccount, LedgerError> {
        self.users
            .snapshot(id)
            .ok_or_else(|| LedgerError::UnknownUser(id.to_string()))
    }

    pub fn transactions_for(&self, id: &str) -> Vec<Transaction> {
        self.transactions.for_user(id)
    }

    pub(crate) fn account_handle(&self, id: &str) -> (AccountHandle, bool) {
        self.users.get_or_insert_with(id, || {
            UserAccount::new(
                id,
                self.config.starting_balance,
                self.config.signup_capital,
                &self.config.game_quotas,
                self.clock.now_utc(),
            )
        })
    }

    pub(crate) fn require(&self, id: &str) -> Result<AccountHandle, LedgerError> {
        self.users
            .handle(id)
            .ok_or_else(|| LedgerError::UnknownUser(id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
