//! Raw Telegram Bot API calls

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::html::{MAX_MESSAGE_CHARS, split_message, strip_tags};
use super::types::{
    API_BASE, AnswerCallbackQueryRequest, InlineKeyboard, SendMessageRequest, SetWebhookRequest,
    TelegramResponse,
};
use super::Messenger;
use crate::retry::{self, Attempt, RetryPolicy};
use crate::{Error, Result};

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    token: SecretString,
    base_url: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn unreachable_chat(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("chat not found") || lower.contains("bot was blocked by the user")
}

impl TelegramClient {
    /// Create a client sharing an existing HTTP handle
    #[must_use]
    pub fn new(http: reqwest::Client, token: SecretString) -> Self {
        Self {
            http,
            token,
            base_url: API_BASE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the client at another endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// POST one Bot API method, retrying transient failures
    async fn call<B: Serialize + Sync>(&self, method: &'static str, body: &B) -> Result<()> {
        let url = format!(
            "{}/bot{}/{method}",
            self.base_url,
            self.token.expose_secret()
        );
        let http = &self.http;
        let url = url.as_str();

        retry::run(&self.retry, method, Error::Channel, move || async move {
            let response = match http.post(url).json(body).send().await {
                Ok(r) => r,
                Err(e) if retry::is_transient(&e) => {
                    return Ok(Attempt::Retry {
                        reason: e.without_url().to_string(),
                        retry_after: None,
                    });
                }
                Err(e) => {
                    return Err(Error::Channel(format!(
                        "Telegram {method} error: {}",
                        e.without_url()
                    )));
                }
            };

            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.is_success() {
                let parsed: Option<TelegramResponse> = serde_json::from_str(&text).ok();
                return match parsed {
                    Some(r) if !r.ok => Err(Error::Channel(format!(
                        "Telegram {method} error: {}",
                        r.description.unwrap_or_default()
                    ))),
                    _ => Ok(Attempt::Done(())),
                };
            }

            if retry::is_recoverable(status.as_u16(), &text) {
                Ok(Attempt::Retry {
                    reason: format!("status {status}"),
                    retry_after: retry::parse_retry_after(&text, None),
                })
            } else {
                Err(Error::Channel(format!(
                    "Telegram {method} error: {status} - {text}"
                )))
            }
        })
        .await
    }

    /// Send a message in HTML parse mode, falling back to plain text
    ///
    /// Long messages are split; the keyboard goes on the last chunk.
    ///
    /// # Errors
    ///
    /// Returns error if the chat is unreachable or both attempts fail
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let chunks = split_message(text, MAX_MESSAGE_CHARS);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let reply_markup = if i == last { keyboard } else { None };
            let html = SendMessageRequest {
                chat_id,
                text: chunk,
                parse_mode: Some("HTML"),
                reply_markup,
            };

            match self.call("sendMessage", &html).await {
                Ok(()) => {}
                Err(Error::Channel(msg)) if unreachable_chat(&msg) => {
                    return Err(Error::Channel(format!(
                        "Telegram chat {chat_id} not reachable: {msg}"
                    )));
                }
                Err(e) => {
                    tracing::warn!(chat_id, error = %e, "HTML send failed, retrying as plain text");
                    let plain_text = strip_tags(chunk);
                    let plain = SendMessageRequest {
                        chat_id,
                        text: &plain_text,
                        parse_mode: None,
                        reply_markup,
                    };
                    self.call("sendMessage", &plain).await?;
                }
            }
        }

        tracing::debug!(chat_id, chunks = chunks.len(), "Telegram message sent");
        Ok(())
    }

    /// Answer a callback query to dismiss the loading spinner on the button
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<()> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id,
            text,
        };
        self.call("answerCallbackQuery", &request).await
    }

    /// Register the webhook URL
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let request = SetWebhookRequest {
            url,
            allowed_updates: ["message", "callback_query"],
            secret_token,
        };
        self.call("setWebhook", &request).await?;
        tracing::info!(url, "Telegram webhook set");
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.send_message(chat_id, text, keyboard).await
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answer_callback_query(callback_id, text).await
    }
}
