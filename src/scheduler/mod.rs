//! Periodic task plumbing.
//!
//! `SingleFlight` keeps at most one invocation of a task in progress no
//! matter who triggers it (the timer loop or an admin endpoint).
//! `spawn_periodic` drives a task from a `tokio::time::interval` and never
//! starts a tick before the previous one has returned.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Single-flight guard
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

/// Held for the duration of one invocation; releases the flight on drop.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    running: &'a AtomicBool,
}

impl SingleFlight {
    pub const fn new() -> Self {
        Self { running: AtomicBool::new(false) }
    }

    /// Claim the flight, or `None` if an invocation is already running.
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { running: &self.running })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Timer loop
// ---------------------------------------------------------------------------

/// Run `task` every `period` until the returned handle is aborted.
///
/// The first tick fires after one full period. Ticks missed while a slow
/// invocation was running are skipped rather than replayed back to back.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(task = name, period_secs = period.as_secs(), "Periodic task scheduled");

        loop {
            interval.tick().await;
            debug!(task = name, "Tick");
            task().await;
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
