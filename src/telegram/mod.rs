//! Telegram transport
//!
//! [`TelegramClient`] talks to the Bot API. Handlers, jobs and the webhook
//! only see the [`Messenger`] trait so tests can capture outbound messages.

mod client;
mod dedup;
pub mod html;
mod types;

use async_trait::async_trait;

pub use client::TelegramClient;
pub use dedup::UpdateDedup;
pub use types::{CallbackQuery, Chat, InlineButton, InlineKeyboard, Message, Update, User};

use crate::Result;

/// Outbound chat messages
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send an HTML message, optionally with inline buttons
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&InlineKeyboard>) -> Result<()>;

    /// Acknowledge a button press
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    /// Whether messages actually leave the process
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Messenger used when no bot token is configured; logs and drops
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMessenger;

#[async_trait]
impl Messenger for DisabledMessenger {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        tracing::debug!(
            chat_id,
            chars = text.chars().count(),
            "Telegram disabled, message dropped"
        );
        Ok(())
    }

    async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_messenger_accepts_everything() {
        let m = DisabledMessenger;
        assert!(!m.is_enabled());
        m.send(1, "hola", None).await.unwrap();
        m.answer_callback("cb", Some("ok")).await.unwrap();
    }
}
