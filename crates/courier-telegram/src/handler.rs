//! Telegram message handler registered in the teloxide Dispatcher.

use std::sync::Arc;

use courier_core::types::Event;
use courier_orchestrator::Orchestrator;
use teloxide::prelude::*;
use teloxide::types::ReactionType;
use tracing::warn;

use crate::allow;
use crate::attach::{self, Transcriber};
use crate::sink::TelegramSink;

/// Static configuration the handler needs beyond what the orchestrator owns.
#[derive(Clone)]
pub struct HandlerConfig {
    pub allowed_chat_ids: Vec<i64>,
    pub max_voice_duration: Option<u32>,
}

/// Main message handler registered in the teloxide Dispatcher.
///
/// Runs for every incoming `Message`:
/// 1. Bot-message filter
/// 2. Allowlist check (deny-by-default, by chat id)
/// 3. Text/caption extraction, or voice transcription
/// 4. "Seen" reaction on acceptance
/// 5. Enqueue into the orchestrator
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    orchestrator: Arc<Orchestrator<TelegramSink>>,
    config: HandlerConfig,
    transcriber: Option<Arc<dyn Transcriber>>,
) -> ResponseResult<()> {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    if !allow::is_allowed(&config.allowed_chat_ids, chat_id) {
        return Ok(());
    }

    let from_name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let event = if let Some(voice) = msg.voice() {
        match build_voice_event(&bot, &msg, voice, &config, transcriber.as_deref(), &from_name).await {
            Some(event) => event,
            None => return Ok(()),
        }
    } else {
        let text = msg.text().or(msg.caption()).unwrap_or("").to_string();
        if text.is_empty() {
            return Ok(());
        }
        Event::new(text, from_name, chat_id.to_string(), msg.id.0 as i64)
    };

    if let Err(e) = bot
        .set_message_reaction(msg.chat.id, msg.id)
        .reaction(vec![ReactionType::Emoji { emoji: "👀".to_string() }])
        .await
    {
        warn!(chat_id, error = %e, "Telegram: failed to set seen reaction");
    }

    orchestrator.ingest(event).await;

    Ok(())
}

async fn build_voice_event(
    bot: &Bot,
    msg: &Message,
    voice: &teloxide::types::Voice,
    config: &HandlerConfig,
    transcriber: Option<&dyn Transcriber>,
    from_name: &str,
) -> Option<Event> {
    let chat_id = msg.chat.id.0;

    if let Some(max_duration) = config.max_voice_duration {
        if voice.duration.seconds() > max_duration {
            warn!(chat_id, duration = voice.duration.seconds(), max_duration, "Telegram: voice message too long, dropping");
            return None;
        }
    }

    let transcriber = transcriber?;
    let audio = attach::download_voice(bot, &voice.file.id).await?;
    let text = transcriber.transcribe(&audio).await;

    match text {
        Some(t) if !t.trim().is_empty() => {
            let mut event = Event::new(t, from_name, chat_id.to_string(), msg.id.0 as i64);
            event.source = Some("voice".to_string());
            event.voice_duration = Some(voice.duration.seconds());
            Some(event)
        }
        _ => {
            let _ = bot.send_message(msg.chat.id, "Sorry, I couldn't understand that voice message.").await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_config_carries_allowlist() {
        let config = HandlerConfig {
            allowed_chat_ids: vec![1, 2],
            max_voice_duration: Some(60),
        };
        assert!(allow::is_allowed(&config.allowed_chat_ids, 1));
        assert!(!allow::is_allowed(&config.allowed_chat_ids, 3));
    }
}
