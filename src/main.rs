//! REFLEDGER — referral-trading ledger service.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the ledger from its snapshot (or starts empty), spawns the
//! periodic tasks and the HTTP dashboard, and saves a final snapshot on
//! Ctrl+C.

use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use refledger::clock::SystemClock;
use refledger::config::AppConfig;
use refledger::dashboard;
use refledger::engine::profit::UniformSampler;
use refledger::engine::Engine;
use refledger::notify::sync::{HttpUserSync, NoopSync, UserSync};
use refledger::notify::telegram::TelegramNotifier;
use refledger::notify::{Dispatcher, LogNotifier, Notifier};
use refledger::scheduler::spawn_periodic;
use refledger::service::LedgerService;
use refledger::storage;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_or_default(CONFIG_PATH)?;
    init_logging();

    let tz = cfg.clock.tz()?;
    info!(
        timezone = %tz,
        starting_balance = %cfg.ledger.starting_balance,
        batch_target = cfg.ledger.batch_target_size,
        profit_interval_secs = cfg.schedule.profit_interval_secs,
        "REFLEDGER starting up"
    );

    // -- Restore or create the ledger ------------------------------------

    let engine = Engine::new(cfg.ledger.clone(), Arc::new(SystemClock::new(tz)), Arc::new(UniformSampler))
        .with_admin(&cfg.admin);
    let engine = match storage::load_snapshot(&cfg.storage.snapshot_path)? {
        Some(snapshot) => engine.restore(snapshot),
        None => engine,
    };

    // -- Collaborators ---------------------------------------------------

    let notifier = build_notifier(&cfg);
    let sync = build_sync(&cfg);
    let dispatcher = Dispatcher::new(notifier, cfg.notifier.timeout());
    let service = Arc::new(LedgerService::new(
        Arc::new(engine),
        dispatcher,
        sync,
        cfg.notifier.timeout(),
    ));

    // -- Periodic tasks --------------------------------------------------

    let tasks = spawn_tasks(&service, &cfg);

    let dashboard = if cfg.dashboard.enabled {
        Some(dashboard::spawn_dashboard(Arc::clone(&service), cfg.dashboard.port).await?)
    } else {
        None
    };

    info!("Ledger running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    for task in tasks.into_iter().chain(dashboard) {
        task.abort();
    }

    service.save_snapshot(&cfg.storage.snapshot_path)?;
    let stats = service.stats();
    info!(
        users = stats.total_users,
        verified = stats.verified,
        active_traders = stats.active_traders,
        batch = stats.batch_id,
        "REFLEDGER shut down cleanly."
    );

    Ok(())
}

fn build_notifier(cfg: &AppConfig) -> Arc<dyn Notifier> {
    if !cfg.notifier.enabled {
        info!("Messaging disabled, notices will be logged only");
        return Arc::new(LogNotifier);
    }
    let token = match AppConfig::resolve_env(&cfg.notifier.bot_token_env) {
        Ok(token) => SecretString::new(token),
        Err(e) => {
            warn!(error = %e, "No bot token, notices will be logged only");
            return Arc::new(LogNotifier);
        }
    };
    match TelegramNotifier::new(token, cfg.notifier.timeout()) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            error!(error = %e, "Failed to build Telegram notifier, falling back to logging");
            Arc::new(LogNotifier)
        }
    }
}

fn build_sync(cfg: &AppConfig) -> Arc<dyn UserSync> {
    let Some(base_url) = cfg.notifier.sync_base_url.as_deref() else {
        return Arc::new(NoopSync);
    };
    match HttpUserSync::new(base_url, cfg.notifier.timeout()) {
        Ok(sync) => {
            info!(base_url, "Web-app sync enabled");
            Arc::new(sync)
        }
        Err(e) => {
            error!(error = %e, "Failed to build web-app sync client, sync disabled");
            Arc::new(NoopSync)
        }
    }
}

/// Run `tick` on the blocking pool every `period`; sweeps lock many
/// accounts and must not stall the async workers.
fn spawn_ledger_task<T, F>(
    name: &'static str,
    period: Duration,
    service: &Arc<LedgerService>,
    tick: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(&LedgerService) -> Option<T> + Send + Sync + Copy + 'static,
{
    let service = Arc::clone(service);
    spawn_periodic(name, period, move || {
        let service = Arc::clone(&service);
        async move {
            match tokio::task::spawn_blocking(move || tick(&service)).await {
                Ok(Some(_)) => {}
                Ok(None) => warn!(task = name, "Previous run still in progress, tick skipped"),
                Err(e) => error!(task = name, error = %e, "Periodic task panicked"),
            }
        }
    })
}

fn spawn_tasks(service: &Arc<LedgerService>, cfg: &AppConfig) -> Vec<JoinHandle<()>> {
    let schedule = &cfg.schedule;
    let mut tasks = vec![
        spawn_ledger_task("profit_accrual", schedule.profit_interval(), service, |s| s.tick_profit_accrual()),
        spawn_ledger_task("daily_reset", schedule.reset_check(), service, |s| s.tick_daily_reset()),
        spawn_ledger_task("batch_sweep", schedule.batch_sweep(), service, |s| s.tick_batch_sweep()),
        spawn_ledger_task("reminders", schedule.reminders(), service, |s| s.tick_reminders()),
    ];

    let snapshot_service = Arc::clone(service);
    let path = cfg.storage.snapshot_path.clone();
    tasks.push(spawn_periodic("snapshot", schedule.snapshot(), move || {
        let service = Arc::clone(&snapshot_service);
        let path = path.clone();
        async move {
            let saved = tokio::task::spawn_blocking(move || service.save_snapshot(&path)).await;
            match saved {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Failed to save snapshot"),
                Err(e) => error!(error = %e, "Snapshot task panicked"),
            }
        }
    }));

    tasks
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("refledger=info"));

    let json_logging = std::env::var("REFLEDGER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
