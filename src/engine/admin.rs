//! Admin console: ledger statistics and announcement sessions.
//!
//! An announcement is a two-step exchange: the admin opens a session,
//! then submits the text, which fans out to every user. Sessions are keyed
//! by admin id and expire after the configured TTL.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::{info, warn};

use super::{Applied, Engine};
use crate::config::AdminConfig;
use crate::error::LedgerError;
use crate::ledger::lock;
use crate::types::{Notice, UserId};

pub struct AdminConsole {
    admins: HashSet<UserId>,
    ttl: Duration,
    /// Open sessions: admin id → expiry.
    sessions: Mutex<HashMap<UserId, DateTime<Utc>>>,
}

impl AdminConsole {
    pub fn new(config: &AdminConfig) -> Self {
        Self {
            admins: config.admin_ids.iter().cloned().collect(),
            ttl: Duration::seconds(config.session_ttl_secs),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_admin(&self, id: &str) -> bool {
        self.admins.contains(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStats {
    pub total_users: usize,
    pub verified: usize,
    pub active_traders: usize,
    pub batch_id: u64,
    pub batch_current: u32,
    pub batch_target: u32,
    pub batch_progress_pct: f64,
}

impl Engine {
    /// Aggregate counts plus the open batch's progress.
    pub fn stats(&self) -> LedgerStats {
        let batch = self.open_batch();
        let mut stats = LedgerStats {
            total_users: 0,
            verified: 0,
            active_traders: 0,
            batch_id: batch.id,
            batch_current: batch.current_count,
            batch_target: batch.target_size,
            batch_progress_pct: batch.progress_pct(),
        };
        for (_, handle) in self.users.handles() {
            let account = lock(&handle);
            stats.total_users += 1;
            stats.verified += usize::from(account.verified);
            stats.active_traders += usize::from(account.trading_active);
        }
        stats
    }

    pub fn authorize_admin(&self, admin_id: &str) -> Result<(), LedgerError> {
        if self.admin.is_admin(admin_id) {
            Ok(())
        } else {
            warn!(admin_id, "Admin action refused");
            Err(LedgerError::NotAdmin(admin_id.to_string()))
        }
    }

    /// Open (or renew) an announcement session. Returns its expiry.
    pub fn begin_announcement(&self, admin_id: &str) -> Result<DateTime<Utc>, LedgerError> {
        self.authorize_admin(admin_id)?;
        let expires_at = self.clock.now_utc() + self.admin.ttl;
        lock(&self.admin.sessions).insert(admin_id.to_string(), expires_at);
        info!(admin_id, %expires_at, "Announcement session opened");
        Ok(expires_at)
    }

    /// Close the session and broadcast `text` to every user. Returns the
    /// number of recipients.
    pub fn submit_announcement(&self, admin_id: &str, text: &str) -> Result<Applied<usize>, LedgerError> {
        self.authorize_admin(admin_id)?;
        let now = self.clock.now_utc();
        let open = lock(&self.admin.sessions)
            .remove(admin_id)
            .is_some_and(|expires_at| now < expires_at);
        if !open {
            return Err(LedgerError::NoActiveSession(admin_id.to_string()));
        }

        let message = format!("📢 Announcement\n\n{text}");
        let notices: Vec<Notice> = self
            .users
            .handles()
            .into_iter()
            .map(|(id, _)| Notice::new(&id, message.clone()))
            .collect();

        info!(admin_id, recipients = notices.len(), "Announcement queued");
        Ok(Applied::new(notices.len(), notices))
    }

    /// Drop the admin's session. True if one was open.
    pub fn cancel_announcement(&self, admin_id: &str) -> Result<bool, LedgerError> {
        self.authorize_admin(admin_id)?;
        Ok(lock(&self.admin.sessions).remove(admin_id).is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
