use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single normalized inbound message, owned by the buffer until drained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub text: String,
    pub from_name: String,
    pub chat_id: String,
    pub message_id: i64,
    pub timestamp: DateTime<Utc>,
    pub source: Option<String>,
    pub voice_duration: Option<u32>,
}

impl Event {
    pub fn new(text: impl Into<String>, from_name: impl Into<String>, chat_id: impl Into<String>, message_id: i64) -> Self {
        Self {
            text: text.into(),
            from_name: from_name.into(),
            chat_id: chat_id.into(),
            message_id,
            timestamp: Utc::now(),
            source: None,
            voice_duration: None,
        }
    }
}

/// A persisted (user text, assistant response) pair. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: i64,
    pub chat_id: String,
    pub user_text: String,
    pub bot_response: String,
    pub duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// At-most-one-per-chat recovery hint, consumed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackContext {
    pub chat_id: String,
    pub stdout: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    High,
    Medium,
    Low,
}

impl TodoPriority {
    /// Lower rank sorts first: high < medium < low.
    pub fn rank(&self) -> u8 {
        match self {
            TodoPriority::High => 1,
            TodoPriority::Medium => 2,
            TodoPriority::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoPriority::High => "high",
            TodoPriority::Medium => "medium",
            TodoPriority::Low => "low",
        }
    }
}

impl std::str::FromStr for TodoPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(TodoPriority::High),
            "medium" => Ok(TodoPriority::Medium),
            "low" => Ok(TodoPriority::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    Pending,
    Done,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::Done => "done",
        }
    }
}

impl std::str::FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TodoStatus::Pending),
            "done" => Ok(TodoStatus::Done),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: i64,
    pub chat_id: String,
    pub title: String,
    pub due_date: Option<String>,
    pub priority: TodoPriority,
    pub status: TodoStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Opaque per-service credential blob; the core never parses `token_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthTokenRecord {
    pub service: String,
    pub token_json: String,
    pub updated_at: DateTime<Utc>,
}
