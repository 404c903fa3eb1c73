use std::sync::Arc;
use std::time::Duration;

use courier_agent::anthropic::AnthropicProvider;
use courier_agent::claude_cli::SubprocessProvider;
use courier_agent::provider::LlmProvider;
use courier_agent::tools::memory_client::GraphitiMemoryClient;
use courier_agent::tools::todo_tools::register_todo_tools;
use courier_agent::tools::ToolRegistry;
use courier_core::config::CourierConfig;
use courier_orchestrator::Orchestrator;
use courier_store::HistoryStore;
use courier_telegram::attach::{SpeechKitTranscriber, Transcriber};
use courier_telegram::{HandlerConfig, TelegramAdapter, TelegramSink};
use teloxide::Bot;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "courier=info".into()),
        )
        .init();

    let config_path = std::env::var("COURIER_CONFIG").ok();
    let config = CourierConfig::load(config_path.as_deref())?;

    let store = Arc::new(HistoryStore::open(&config.history_db)?);

    let provider: Arc<dyn LlmProvider> = if let Some(api_key) = config.anthropic_api_key.clone() {
        Arc::new(AnthropicProvider::new(api_key, None))
    } else {
        let command = std::env::var("COURIER_CLI_COMMAND").unwrap_or_else(|_| "claude".to_string());
        let timeout = Duration::from_secs(config.claude_timeout.unwrap_or(120));
        Arc::new(SubprocessProvider::new(command, config.mcp_config_path.clone(), timeout))
    };

    let memory_client = config.graphiti_url.clone().map(GraphitiMemoryClient::new);

    let store_for_registry = store.clone();
    let build_registry = Arc::new(move |chat_id: &str| {
        let mut registry = ToolRegistry::new();
        register_todo_tools(&mut registry, store_for_registry.clone(), chat_id.to_string());
        if let Some(client) = memory_client.clone() {
            client.register_tools(&mut registry, chat_id.to_string());
        }
        registry
    });

    let bot = Bot::new(&config.telegram_token);
    let sink = Arc::new(TelegramSink::new(bot.clone()));

    let orchestrator = Orchestrator::new(
        store,
        provider,
        sink,
        Duration::from_secs(config.debounce_delay),
        config.history_turns,
        config.history_max_chars,
        config.fallback_max_chars,
        config.user_timezone.clone(),
        config.model.clone(),
        config.max_tokens,
        config.temperature,
        build_registry,
    );

    let transcriber: Option<Arc<dyn Transcriber>> = match (&config.speechkit_api_key, &config.yandex_folder_id) {
        (Some(key), Some(folder)) => Some(Arc::new(SpeechKitTranscriber::new(
            key.clone(),
            folder.clone(),
            config.speechkit_lang.clone(),
        ))),
        _ => None,
    };

    let handler_config = HandlerConfig {
        allowed_chat_ids: config.telegram_allowed_chat_ids.clone(),
        max_voice_duration: config.max_voice_duration,
    };

    info!(mode = ?config.telegram_mode, "courier: starting Telegram adapter");
    let adapter = TelegramAdapter::new(bot, orchestrator, handler_config, transcriber);
    adapter.run().await;

    Ok(())
}
