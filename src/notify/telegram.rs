//! Telegram notifier — posts to the Bot API's `sendMessage`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::error::NotifyError;
use crate::notify::Notifier;

/// Notifier backed by a Telegram bot. Owner ids are Telegram chat ids.
pub struct TelegramNotifier {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// Send a message, trying Markdown first with plain-text fallback.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        warn!(
            status = ?markdown_status,
            "sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(NotifyError::SendFailed {
                owner: chat_id,
                reason: format!("sendMessage failed (markdown: {markdown_status}, plain: {plain_err})"),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, owner_id: i64, text: &str) -> Result<(), NotifyError> {
        self.send_message(owner_id, text).await
    }
}
