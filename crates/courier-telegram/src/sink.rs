//! Telegram implementation of the orchestrator's output side.

use courier_orchestrator::{ResponseSink, TypingSink};
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tracing::{debug, warn};

use crate::send;

/// Routes typing indicators and finished responses from the orchestrator
/// back out through a teloxide `Bot`.
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn parse_chat_id(chat_id: &str) -> Option<ChatId> {
        chat_id.parse::<i64>().ok().map(ChatId)
    }
}

#[async_trait::async_trait]
impl TypingSink for TelegramSink {
    async fn send_typing(&self, chat_id: &str) {
        let Some(id) = Self::parse_chat_id(chat_id) else {
            return;
        };
        if let Err(e) = self.bot.send_chat_action(id, ChatAction::Typing).await {
            debug!(chat_id, error = %e, "Telegram: failed to send typing indicator");
        }
    }
}

#[async_trait::async_trait]
impl ResponseSink for TelegramSink {
    async fn send_response(&self, chat_id: &str, text: &str) {
        let Some(id) = Self::parse_chat_id(chat_id) else {
            warn!(chat_id, "Telegram: cannot send response, invalid chat id");
            return;
        };
        send::send_response(&self.bot, id, text).await;
    }
}
