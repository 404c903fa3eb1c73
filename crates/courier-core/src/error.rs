use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("LLM backend rate limited, retry after {retry_after_ms}ms")]
    BackendRateLimited { retry_after_ms: u64 },

    #[error("LLM backend overloaded")]
    BackendOverloaded,

    #[error("LLM backend transient error: {0}")]
    BackendTransient(String),

    #[error("LLM backend permanent error: {0}")]
    BackendPermanent(String),

    #[error("LLM backend call timed out after {ms}ms")]
    BackendTimeout { ms: u64 },

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    MaxRetriesExceeded { attempts: u32, last: String },

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CourierError {
    pub fn code(&self) -> &'static str {
        match self {
            CourierError::Config(_) => "CONFIG_ERROR",
            CourierError::Transport(_) => "TRANSPORT_ERROR",
            CourierError::Store(_) => "STORE_ERROR",
            CourierError::BackendRateLimited { .. } => "BACKEND_RATE_LIMITED",
            CourierError::BackendOverloaded => "BACKEND_OVERLOADED",
            CourierError::BackendTransient(_) => "BACKEND_TRANSIENT",
            CourierError::BackendPermanent(_) => "BACKEND_PERMANENT",
            CourierError::BackendTimeout { .. } => "BACKEND_TIMEOUT",
            CourierError::Tool(_) => "TOOL_ERROR",
            CourierError::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
            CourierError::ProcessingFailed(_) => "PROCESSING_FAILED",
            CourierError::Serialization(_) => "SERIALIZATION_ERROR",
            CourierError::Io(_) => "IO_ERROR",
            CourierError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CourierError>;
