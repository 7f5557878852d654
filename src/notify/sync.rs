//! Web-app synchronisation.
//!
//! Pushes user records and referral links to the companion web app. Like
//! notices, sync calls are best-effort: the caller bounds them with a
//! timeout and logs failures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::types::UserAccount;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserSync: Send + Sync {
    /// Send the full account record.
    async fn push_user(&self, account: &UserAccount) -> Result<()>;

    /// Record that `referred_id` joined through `referrer_id`.
    async fn track_referral(&self, referrer_id: &str, referred_id: &str) -> Result<()>;
}

/// Used when no web app is configured.
#[derive(Debug, Default)]
pub struct NoopSync;

#[async_trait]
impl UserSync for NoopSync {
    async fn push_user(&self, _account: &UserAccount) -> Result<()> {
        Ok(())
    }

    async fn track_referral(&self, _referrer_id: &str, _referred_id: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SyncPayload<'a> {
    user_id: &'a str,
    user_data: &'a UserAccount,
}

#[derive(Debug, Serialize)]
struct ReferralPayload<'a> {
    referrer_id: &'a str,
    referred_id: &'a str,
}

pub struct HttpUserSync {
    http: Client,
    base_url: String,
}

impl HttpUserSync {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build web-app sync HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + ?Sized + Sync>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{path}", self.base_url);
        let response = self.http
            .post(&url)
            .json(body)
            .send()
            .await
            .context(format!("POST {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Web app returned {status} for {path}: {text}");
        }
        debug!(path, "Web app sync ok");
        Ok(())
    }
}

#[async_trait]
impl UserSync for HttpUserSync {
    async fn push_user(&self, account: &UserAccount) -> Result<()> {
        let payload = SyncPayload { user_id: &account.id, user_data: account };
        self.post("/api/telegram/sync", &payload).await
    }

    async fn track_referral(&self, referrer_id: &str, referred_id: &str) -> Result<()> {
        let payload = ReferralPayload { referrer_id, referred_id };
        self.post("/api/track-referral", &payload).await
    }
}
