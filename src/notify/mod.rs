//! Outbound messaging.
//!
//! Defines the `Notifier` trait (best-effort delivery of one message to
//! one user) and the `Dispatcher` that fans engine notices out to it.
//! Delivery is fire-and-forget: every call is bounded by a timeout,
//! failures are logged and never retried, and one failed recipient never
//! stops the rest.

pub mod sync;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::Notice;

/// Concurrent deliveries per dispatch.
const MAX_IN_FLIGHT: usize = 16;

/// Trait for delivering a message to a user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `user_id`.
    async fn notify(&self, user_id: &str, message: &str) -> Result<()>;

    /// Human-readable collaborator name for logs.
    fn name(&self) -> &'static str;
}

/// Writes every message to the log instead of sending it. Used when no
/// messaging backend is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> Result<()> {
        info!(user_id, message, "Notice");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Deliver in the background. Outside a Tokio runtime the notices are
    /// dropped with a warning.
    pub fn dispatch(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn(async move {
                    this.deliver_all(notices).await;
                });
            }
            Err(_) => warn!(count = notices.len(), "No runtime available, notices dropped"),
        }
    }

    /// Deliver every notice and wait for the outcome.
    pub async fn deliver_all(&self, notices: Vec<Notice>) -> DeliveryReport {
        let total = notices.len();
        let outcomes: Vec<bool> = stream::iter(notices)
            .map(|notice| async move { self.deliver(&notice).await })
            .buffer_unordered(MAX_IN_FLIGHT)
            .collect()
            .await;

        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let report = DeliveryReport { delivered, failed: total - delivered };
        if report.failed > 0 {
            warn!(
                notifier = self.notifier.name(),
                delivered = report.delivered,
                failed = report.failed,
                "Some notices were not delivered"
            );
        } else {
            debug!(notifier = self.notifier.name(), delivered, "Notices delivered");
        }
        report
    }

    async fn deliver(&self, notice: &Notice) -> bool {
        let call = self.notifier.notify(&notice.user_id, &notice.message);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(user_id = %notice.user_id, error = %e, "Notice delivery failed");
                false
            }
            Err(_) => {
                warn!(
                    user_id = %notice.user_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Notice delivery timed out"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
