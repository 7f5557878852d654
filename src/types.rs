//! Shared types for the ledger.
//!
//! These types form the data model used across all modules. They are
//! serializable so the storage layer can snapshot them as-is.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque, stable user identifier (the chat id in the reference deployment).
pub type UserId = String;

// ---------------------------------------------------------------------------
// User account
// ---------------------------------------------------------------------------

/// Per-game earnings summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameStats {
    pub plays: u32,
    pub total_earned: Decimal,
    pub best_reward: Decimal,
}

impl GameStats {
    /// Stats after one more play paying `reward`, or `None` on overflow.
    pub fn with_play(&self, reward: Decimal) -> Option<Self> {
        Some(Self {
            plays: self.plays.checked_add(1)?,
            total_earned: self.total_earned.checked_add(reward)?,
            best_reward: self.best_reward.max(reward),
        })
    }
}

/// Trading state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingState {
    Inactive,
    Active,
}

impl fmt::Display for TradingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingState::Inactive => write!(f, "inactive"),
            TradingState::Active => write!(f, "active"),
        }
    }
}

/// The authoritative per-user record.
///
/// Every field has an explicit value from construction onward; nothing is
/// read with a fallback default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub balance: Decimal,
    pub trading_capital: Decimal,
    pub withdrawable_profit: Decimal,
    pub referrals_count: u32,
    pub ads_watched_today: u32,
    pub verified: bool,
    pub trading_active: bool,
    pub streak_count: u32,
    pub streak_last_login: Option<NaiveDate>,
    pub referral_bonus_eligible: bool,
    /// Referrer this account was credited to, if any.
    pub referred_by: Option<UserId>,
    pub last_ad_watch: Option<DateTime<Utc>>,
    /// Remaining attempts today, per game id.
    pub game_attempts: BTreeMap<String, u32>,
    pub game_stats: BTreeMap<String, GameStats>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(
        id: impl Into<UserId>,
        starting_balance: Decimal,
        signup_capital: Decimal,
        game_quotas: &BTreeMap<String, u32>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            balance: starting_balance,
            trading_capital: signup_capital,
            withdrawable_profit: Decimal::ZERO,
            referrals_count: 0,
            ads_watched_today: 0,
            verified: false,
            trading_active: false,
            streak_count: 0,
            streak_last_login: None,
            referral_bonus_eligible: true,
            referred_by: None,
            last_ad_watch: None,
            game_attempts: game_quotas.clone(),
            game_stats: BTreeMap::new(),
            created_at,
        }
    }

    pub fn trading_state(&self) -> TradingState {
        if self.trading_active {
            TradingState::Active
        } else {
            TradingState::Inactive
        }
    }

    /// Verified and holding at least `threshold` in withdrawable profit.
    pub fn is_payout_eligible(&self, threshold: Decimal) -> bool {
        self.verified && self.withdrawable_profit >= threshold
    }

    #[cfg(test)]
    pub fn sample(id: &str) -> Self {
        use rust_decimal_macros::dec;
        Self::new(
            id,
            dec!(5000),
            dec!(5000),
            &BTreeMap::from([("trivia".to_string(), 3)]),
            Utc::now(),
        )
    }
}

impl fmt::Display for UserAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] balance={} capital={} profit={} refs={} ads={} trading={} verified={}",
            self.id,
            self.balance,
            self.trading_capital,
            self.withdrawable_profit,
            self.referrals_count,
            self.ads_watched_today,
            self.trading_state(),
            self.verified,
        )
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Profit,
    ReferralBonus,
    StreakBonus,
    Withdrawal,
    GameReward,
    VerificationCredit,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Profit => "profit",
            TransactionKind::ReferralBonus => "referral_bonus",
            TransactionKind::StreakBonus => "streak_bonus",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::GameReward => "game_reward",
            TransactionKind::VerificationCredit => "verification_credit",
        };
        write!(f, "{s}")
    }
}

/// Only completed transactions are ever recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
}

/// One balance-affecting event. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Transaction {
    pub fn completed(
        user_id: &str,
        amount: Decimal,
        kind: TransactionKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            amount,
            kind,
            status: TransactionStatus::Completed,
            timestamp,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {}",
            self.user_id,
            self.kind,
            self.amount,
            self.timestamp.to_rfc3339(),
        )
    }
}

// ---------------------------------------------------------------------------
// Payment batches
// ---------------------------------------------------------------------------

/// A threshold-gated payout cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBatch {
    pub id: u64,
    pub target_size: u32,
    pub current_count: u32,
    pub payout_date: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl PaymentBatch {
    pub fn open(id: u64, target_size: u32) -> Self {
        Self {
            id,
            target_size,
            current_count: 0,
            payout_date: None,
            completed: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.current_count >= self.target_size
    }

    /// Fill level as a percentage of the target size.
    pub fn progress_pct(&self) -> f64 {
        if self.target_size == 0 {
            100.0
        } else {
            f64::from(self.current_count) / f64::from(self.target_size) * 100.0
        }
    }
}

impl fmt::Display for PaymentBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch #{} {}/{} ({:.1}%){}",
            self.id,
            self.current_count,
            self.target_size,
            self.progress_pct(),
            if self.completed { " completed" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// A message intent for the external messaging collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub user_id: UserId,
    pub message: String,
}

impl Notice {
    pub fn new(user_id: &str, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            message: message.into(),
        }
    }
}

/// Format a currency amount the way user-facing notices show it.
pub fn naira(amount: Decimal) -> String {
    let rounded = amount.round_dp(2).normalize();
    let text = rounded.to_string();
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w.to_string(), Some(f.to_string())),
        None => (text, None),
    };
    let (sign, digits) = match whole.strip_prefix('-') {
        Some(d) => ("-", d.to_string()),
        None => ("", whole),
    };

    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac {
        Some(f) => format!("{sign}₦{grouped}.{f}"),
        None => format!("{sign}₦{grouped}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
