pub mod typing;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_agent::prompt::assemble_prompt;
use courier_agent::provider::{ChatRequest, LlmProvider};
use courier_agent::tools::tool_loop::run_tool_loop;
use courier_agent::tools::ToolRegistry;
use courier_buffer::MessageBuffer;
use courier_core::types::Event;
use courier_store::HistoryStore;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

pub use crate::typing::TypingSink;
use crate::typing::TypingHandle;

const MAX_CONSECUTIVE_FAILURES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
const APOLOGY_MESSAGE: &str = "I'm having trouble processing your messages right now. I'll stop retrying for now — please try again later.";

/// Anything the orchestrator needs from the transport to deliver a response.
#[async_trait::async_trait]
pub trait ResponseSink: TypingSink {
    async fn send_response(&self, chat_id: &str, text: &str);
}

/// Per-chat in-memory state: buffer, serialization lock, failure counter.
struct ChatState {
    buffer: Arc<MessageBuffer>,
    lock: AsyncMutex<()>,
    consecutive_failures: AsyncMutex<u32>,
}

/// Owns the per-chat state machines and wires together the store, buffer,
/// prompt assembler, retry-capable LLM driver, and tool registry.
pub struct Orchestrator<S: ResponseSink + 'static> {
    chats: AsyncMutex<HashMap<String, Arc<ChatState>>>,
    store: Arc<HistoryStore>,
    provider: Arc<dyn LlmProvider>,
    sink: Arc<S>,
    debounce_delay: Duration,
    history_turns: u32,
    history_max_chars: usize,
    fallback_max_chars: usize,
    user_timezone: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry_delay: Duration,
    build_registry: Arc<dyn Fn(&str) -> ToolRegistry + Send + Sync>,
}

impl<S: ResponseSink + 'static> Orchestrator<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<HistoryStore>,
        provider: Arc<dyn LlmProvider>,
        sink: Arc<S>,
        debounce_delay: Duration,
        history_turns: u32,
        history_max_chars: usize,
        fallback_max_chars: usize,
        user_timezone: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
        build_registry: Arc<dyn Fn(&str) -> ToolRegistry + Send + Sync>,
    ) -> Arc<Self> {
        Self::with_retry_delay(
            store,
            provider,
            sink,
            debounce_delay,
            history_turns,
            history_max_chars,
            fallback_max_chars,
            user_timezone,
            model,
            max_tokens,
            temperature,
            build_registry,
            DEFAULT_RETRY_DELAY,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_retry_delay(
        store: Arc<HistoryStore>,
        provider: Arc<dyn LlmProvider>,
        sink: Arc<S>,
        debounce_delay: Duration,
        history_turns: u32,
        history_max_chars: usize,
        fallback_max_chars: usize,
        user_timezone: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
        build_registry: Arc<dyn Fn(&str) -> ToolRegistry + Send + Sync>,
        retry_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            chats: AsyncMutex::new(HashMap::new()),
            store,
            provider,
            sink,
            debounce_delay,
            history_turns,
            history_max_chars,
            fallback_max_chars,
            user_timezone,
            model,
            max_tokens,
            temperature,
            retry_delay,
            build_registry,
        })
    }

    /// Enqueue an event for a chat, starting a processing task if none is running.
    pub async fn ingest(self: &Arc<Self>, event: Event) {
        let chat_id = event.chat_id.clone();
        let (state, spawn) = {
            let mut chats = self.chats.lock().await;
            match chats.get(&chat_id) {
                Some(state) => (state.clone(), false),
                None => {
                    let state = Arc::new(ChatState {
                        buffer: Arc::new(MessageBuffer::new(self.debounce_delay)),
                        lock: AsyncMutex::new(()),
                        consecutive_failures: AsyncMutex::new(0),
                    });
                    chats.insert(chat_id.clone(), state.clone());
                    (state, true)
                }
            }
        };
        state.buffer.add(event);
        if spawn {
            let this = self.clone();
            let chat_id = chat_id.clone();
            tokio::spawn(async move { this.run_chat_task(chat_id).await });
        }
    }

    async fn run_chat_task(self: Arc<Self>, chat_id: String) {
        loop {
            let state = {
                let chats = self.chats.lock().await;
                match chats.get(&chat_id) {
                    Some(s) => s.clone(),
                    None => return,
                }
            };

            let events = state.buffer.wait_and_drain().await;
            if events.is_empty() {
                continue;
            }

            let _guard = state.lock.lock().await;
            let outcome = self.process_batch(&chat_id, &events).await;

            match outcome {
                Ok(()) => {
                    *state.consecutive_failures.lock().await = 0;
                }
                Err(err) => {
                    error!(chat_id = %chat_id, error = %err, "processing cycle failed");
                    let raw_texts: Vec<&str> = events.iter().map(|e| e.text.as_str()).collect();
                    let blob = truncate(&format!("Processing failed for messages: {raw_texts:?}"), self.fallback_max_chars);
                    if let Err(e) = self.store.save_fallback(chat_id.clone(), blob).await {
                        warn!(error = %e, "failed to persist fallback context");
                    }

                    let mut failures = state.consecutive_failures.lock().await;
                    *failures += 1;
                    if *failures >= MAX_CONSECUTIVE_FAILURES {
                        self.sink.send_response(&chat_id, APOLOGY_MESSAGE).await;
                        drop(failures);
                        self.chats.lock().await.remove(&chat_id);
                        return;
                    }
                    drop(failures);
                    state.buffer.append(events);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }

            if state.buffer.is_empty() {
                let mut chats = self.chats.lock().await;
                if state.buffer.is_empty() {
                    chats.remove(&chat_id);
                    return;
                }
            }
        }
    }

    async fn process_batch(&self, chat_id: &str, events: &[Event]) -> Result<(), String> {
        let start = Instant::now();
        let typing = TypingHandle::start(self.sink.clone(), chat_id.to_string());

        let result = self.process_batch_inner(chat_id, events).await;

        typing.stop();

        match result {
            Ok(response) => {
                let user_text = events.iter().map(|e| e.text.as_str()).collect::<Vec<_>>().join("\n");
                let duration_ms = start.elapsed().as_millis() as i64;
                self.store
                    .save_turn(chat_id.to_string(), user_text, response.clone(), Some(duration_ms))
                    .await
                    .map_err(|e| e.to_string())?;
                self.store.clear_fallback(chat_id.to_string()).await.map_err(|e| e.to_string())?;
                self.sink.send_response(chat_id, &response).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn process_batch_inner(&self, chat_id: &str, events: &[Event]) -> Result<String, String> {
        let history = self
            .store
            .recent_turns(chat_id.to_string(), self.history_turns, self.history_max_chars)
            .await
            .map_err(|e| e.to_string())?;
        let fallback = self.store.get_fallback(chat_id.to_string()).await.map_err(|e| e.to_string())?;

        let prompt = assemble_prompt(chat_id, &self.user_timezone, &history, events, fallback.as_ref());

        let registry = (self.build_registry)(chat_id);
        let request = ChatRequest {
            model: self.model.clone(),
            system: prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tools: registry.definitions(),
            raw_messages: vec![serde_json::json!({ "role": "user", "content": prompt })],
        };

        info!(chat_id, events = events.len(), "processing batch");
        run_tool_loop(self.provider.as_ref(), request, &registry).await.map_err(|e| e.to_string())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
