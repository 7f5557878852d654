//! Telegram Bot API notifier.
//!
//! Sends plain-text messages through `sendMessage`. User ids are Telegram
//! chat ids. The bot token is held as a `SecretString` and only exposed
//! when building the request URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::Notifier;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    http: Client,
    token: SecretString,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(token: SecretString, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            http,
            token,
            api_base: TELEGRAM_API_URL.to_string(),
        })
    }

    /// Point the client at a different Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token.expose_secret())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id: user_id, text: message };

        let response = self.http
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .context("Telegram sendMessage request failed")?;

        let status = response.status();
        let body: ApiResponse = response.json().await
            .context(format!("Failed to parse Telegram response (HTTP {status})"))?;

        if !body.ok {
            anyhow::bail!(
                "Telegram API error {status}: {}",
                body.description.unwrap_or_default()
            );
        }

        debug!(user_id, "Telegram message sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
