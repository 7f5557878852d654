//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section falls back to the production economics when omitted, so
//! an empty file is a valid configuration. Secrets (the bot token) are
//! referenced by env-var name and resolved at runtime via `std::env::var`.

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub schedule: ScheduleConfig,
    pub clock: ClockConfig,
    pub notifier: NotifierConfig,
    pub dashboard: DashboardConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
}

/// Economics of the ledger: bonuses, thresholds and rate bands.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    /// Balance credited to every new account.
    pub starting_balance: Decimal,
    /// Trading capital every account starts with (the signup grant).
    pub signup_capital: Decimal,
    /// Credited to both balance and trading capital per referral.
    pub referral_bonus: Decimal,
    pub max_referrals: u32,
    /// Ads that must be watched in a day before trading can activate.
    pub ads_required: u32,
    pub verification_credit: Decimal,
    /// Minimum withdrawable profit for a verified user to join a batch.
    pub payout_threshold: Decimal,
    pub batch_target_size: u32,
    pub streak_base_bonus: Decimal,
    pub streak_step_bonus: Decimal,
    pub streak_bonus_cap: Decimal,
    /// Hour-of-day profit rate bands, evaluated in local time.
    pub rate_bands: Vec<RateBand>,
    /// Daily attempt quota per game id.
    pub game_quotas: BTreeMap<String, u32>,
}

/// Inclusive hour range mapped to a uniform profit rate range.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateBand {
    pub start_hour: u32,
    pub end_hour: u32,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl RateBand {
    pub fn new(start_hour: u32, end_hour: u32, min_rate: f64, max_rate: f64) -> Self {
        Self { start_hour, end_hour, min_rate, max_rate }
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..=self.end_hour).contains(&hour)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: dec!(5000),
            signup_capital: dec!(5000),
            referral_bonus: dec!(5000),
            max_referrals: 6,
            ads_required: 20,
            verification_credit: dec!(500),
            payout_threshold: dec!(5000),
            batch_target_size: 1000,
            streak_base_bonus: dec!(500),
            streak_step_bonus: dec!(100),
            streak_bonus_cap: dec!(1100),
            rate_bands: vec![
                RateBand::new(0, 7, 0.35, 0.50),
                RateBand::new(8, 16, 0.21, 0.34),
                RateBand::new(17, 23, 0.20, 0.20),
            ],
            game_quotas: BTreeMap::from([
                ("trivia".to_string(), 3),
                ("wheel".to_string(), 3),
            ]),
        }
    }
}

/// Intervals of the periodic tasks, in seconds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Each profit tick applies one freshly sampled rate to every active trader.
    pub profit_interval_secs: u64,
    /// How often the daily-reset task checks for a new local calendar day.
    pub reset_check_secs: u64,
    pub batch_sweep_secs: u64,
    pub reminder_secs: u64,
    pub snapshot_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            profit_interval_secs: 3600,
            reset_check_secs: 60,
            batch_sweep_secs: 21_600,
            reminder_secs: 60,
            snapshot_secs: 300,
        }
    }
}

impl ScheduleConfig {
    pub fn profit_interval(&self) -> Duration {
        Duration::from_secs(self.profit_interval_secs.max(1))
    }

    pub fn reset_check(&self) -> Duration {
        Duration::from_secs(self.reset_check_secs.max(1))
    }

    pub fn batch_sweep(&self) -> Duration {
        Duration::from_secs(self.batch_sweep_secs.max(1))
    }

    pub fn reminders(&self) -> Duration {
        Duration::from_secs(self.reminder_secs.max(1))
    }

    pub fn snapshot(&self) -> Duration {
        Duration::from_secs(self.snapshot_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClockConfig {
    /// IANA timezone name the ledger's calendar days are bound to.
    pub timezone: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { timezone: "Africa/Lagos".to_string() }
    }
}

impl ClockConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone {}: {e}", self.timezone))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    /// When false, notices are only logged.
    pub enabled: bool,
    pub bot_token_env: String,
    /// Base URL of the companion web app; sync is skipped when absent.
    pub sync_base_url: Option<String>,
    /// Upper bound on any single notify or sync call.
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token_env: "TELEGRAM_TOKEN".to_string(),
            sync_base_url: None,
            timeout_secs: 10,
        }
    }
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { enabled: true, port: 8443 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { snapshot_path: "refledger_state.json".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdminConfig {
    pub admin_ids: Vec<String>,
    /// Idle announcement sessions expire after this many seconds.
    pub session_ttl_secs: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { admin_ids: Vec::new(), session_ttl_secs: 600 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from the given path, or fall back to defaults when it doesn't exist.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
