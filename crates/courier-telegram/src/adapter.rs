//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event loop
//! until the process exits.

use std::sync::Arc;

use courier_orchestrator::Orchestrator;
use teloxide::prelude::*;
use tracing::info;

use crate::attach::Transcriber;
use crate::handler::{handle_message, HandlerConfig};
use crate::sink::TelegramSink;

/// Telegram channel adapter.
///
/// Wraps a teloxide `Bot` and drives the Dispatcher event loop until the
/// process exits. Long polling — no public URL required.
pub struct TelegramAdapter {
    bot: Bot,
    orchestrator: Arc<Orchestrator<TelegramSink>>,
    config: HandlerConfig,
    transcriber: Option<Arc<dyn Transcriber>>,
}

impl TelegramAdapter {
    pub fn new(
        bot: Bot,
        orchestrator: Arc<Orchestrator<TelegramSink>>,
        config: HandlerConfig,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Self {
        Self {
            bot,
            orchestrator,
            config,
            transcriber,
        }
    }

    /// Connect to Telegram and drive the long-polling loop.
    ///
    /// Never returns — runs for the lifetime of the process.
    pub async fn run(self) {
        info!("Telegram: starting long-polling dispatcher");

        let orchestrator = self.orchestrator;
        let config = self.config;
        let transcriber = self.transcriber;

        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![orchestrator, config, transcriber])
            .default_handler(|_upd| async {})
            .build()
            .dispatch()
            .await;
    }
}
