use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

const TYPING_INTERVAL: Duration = Duration::from_secs(4);
const MAX_TYPING_DURATION: Duration = Duration::from_secs(120);

/// Anything that can signal "typing" for a chat. Implemented by the
/// transport adapter (e.g. Telegram's `send_chat_action`).
#[async_trait::async_trait]
pub trait TypingSink: Send + Sync {
    async fn send_typing(&self, chat_id: &str);
}

/// A running typing-indicator task. Dropping or calling `stop` aborts it.
pub struct TypingHandle {
    handle: JoinHandle<()>,
}

impl TypingHandle {
    pub fn start<S: TypingSink + 'static>(sink: Arc<S>, chat_id: String) -> Self {
        let handle = tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + MAX_TYPING_DURATION;
            loop {
                sink.send_typing(&chat_id).await;
                if tokio::time::Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(TYPING_INTERVAL).await;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
