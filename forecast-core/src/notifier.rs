//! Delivery of the rendered report to a Telegram channel.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt::Debug;
use tracing::{debug, info, instrument};

use crate::{
    config::TelegramConfig,
    error::{DigestError, Result, truncate_body},
    model::{DeliveryResult, OutboundMessage},
};

#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Send `text` once. No retries.
    async fn send(&self, text: &str) -> Result<DeliveryResult>;
}

/// Bot API client bound to a single destination chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TgErrorResponse {
    description: String,
}

fn required(value: &Option<String>, what: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(DigestError::Config(format!(
            "Telegram {what} is not set.\n\
             Hint: export {} / {} or run `forecast-digest configure`.",
            crate::config::TOKEN_ENV,
            crate::config::CHANNEL_ENV,
        ))),
    }
}

impl TelegramNotifier {
    /// Fails with a configuration error when the token or channel id is unset.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let bot_token = required(&config.bot_token, "bot token")?;
        let chat_id = required(&config.channel_id, "channel id")?;

        Ok(Self {
            http: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }

    pub fn message(&self, text: &str) -> OutboundMessage {
        OutboundMessage { chat_id: self.chat_id.clone(), text: text.to_string() }
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    /// Same endpoint with the token masked, for logs and errors.
    fn redacted_url(&self) -> String {
        format!("{}/bot<redacted>/sendMessage", self.api_base)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, text), fields(chat_id = %self.chat_id, len = text.len()))]
    async fn send(&self, text: &str) -> Result<DeliveryResult> {
        let message = self.message(text);
        debug!(url = %self.redacted_url(), "Sending message");

        let res = self
            .http
            .get(self.send_url())
            .query(&[("chat_id", message.chat_id.as_str()), ("text", message.text.as_str())])
            .send()
            .await
            .map_err(|e| DigestError::Transport { url: self.redacted_url(), source: e.without_url() })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| DigestError::Transport {
            url: self.redacted_url(),
            source: e.without_url(),
        })?;

        if !status.is_success() {
            let reason = serde_json::from_str::<TgErrorResponse>(&body)
                .map(|e| e.description)
                .unwrap_or_else(|_| truncate_body(&body));
            return Err(DigestError::HttpStatus { url: self.redacted_url(), status, body: reason });
        }

        info!(%status, "Message delivered");
        Ok(DeliveryResult { status: status.as_u16(), body })
    }
}
