use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single message in the conversation history sent to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Tool definition sent to the LLM API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from the LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tools: Vec<ToolDefinition>,
    /// Raw JSON messages for the tool loop; lets the driver build structured
    /// content blocks (tool_use, tool_result) that a plain string can't hold.
    pub raw_messages: Vec<serde_json::Value>,
}

/// Response from an LLM provider (non-streaming).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
    pub tool_calls: Vec<ToolCall>,
    /// Full assistant content blocks (text + tool_use), for appending to raw_messages.
    pub raw_content: serde_json::Value,
}

/// Common interface for both LLM backend shapes (hosted API, spawned CLI).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider overloaded")]
    Overloaded,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("call timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Whether the retry harness should retry this class of error.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Overloaded | ProviderError::Unavailable(_)
        ) || matches!(self, ProviderError::Api { status, .. } if *status >= 500)
    }
}
