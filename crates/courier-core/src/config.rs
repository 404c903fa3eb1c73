use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_HISTORY_TURNS: u32 = 20;
pub const DEFAULT_HISTORY_MAX_CHARS: usize = 500;
pub const DEFAULT_DEBOUNCE_DELAY_SECS: u64 = 5;
pub const DEFAULT_FALLBACK_MAX_CHARS: usize = 4000;
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;

/// Top-level config (courier.toml + COURIER_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierConfig {
    pub anthropic_api_key: Option<String>,
    pub telegram_token: String,
    #[serde(deserialize_with = "deserialize_chat_ids")]
    pub telegram_allowed_chat_ids: Vec<i64>,

    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_history_turns")]
    pub history_turns: u32,
    #[serde(default = "default_history_max_chars")]
    pub history_max_chars: usize,
    #[serde(default = "default_history_db")]
    pub history_db: String,

    #[serde(default = "default_debounce_delay")]
    pub debounce_delay: u64,
    #[serde(default = "default_timezone")]
    pub user_timezone: String,

    pub graphiti_url: Option<String>,

    #[serde(default = "default_telegram_mode")]
    pub telegram_mode: TelegramMode,
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_fallback_max_chars")]
    pub fallback_max_chars: usize,

    pub speechkit_api_key: Option<String>,
    pub yandex_folder_id: Option<String>,
    pub speechkit_lang: Option<String>,
    pub max_voice_duration: Option<u32>,

    pub claude_timeout: Option<u64>,
    pub mcp_config_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelegramMode {
    Polling,
    Webhook,
}

fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}
fn default_history_turns() -> u32 {
    DEFAULT_HISTORY_TURNS
}
fn default_history_max_chars() -> usize {
    DEFAULT_HISTORY_MAX_CHARS
}
fn default_history_db() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.courier/courier.db")
}
fn default_debounce_delay() -> u64 {
    DEFAULT_DEBOUNCE_DELAY_SECS
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_telegram_mode() -> TelegramMode {
    TelegramMode::Polling
}
fn default_webhook_port() -> u16 {
    DEFAULT_WEBHOOK_PORT
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_fallback_max_chars() -> usize {
    DEFAULT_FALLBACK_MAX_CHARS
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.courier/courier.toml")
}

/// Accepts either a TOML array of ints or a comma-separated string (for env overrides).
fn deserialize_chat_ids<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ChatIds {
        List(Vec<i64>),
        Csv(String),
    }

    match ChatIds::deserialize(deserializer)? {
        ChatIds::List(v) => Ok(v),
        ChatIds::Csv(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<i64>().map_err(serde::de::Error::custom))
            .collect(),
    }
}

impl CourierConfig {
    /// Load config from a TOML file with COURIER_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.map(String::from).unwrap_or_else(default_config_path);

        let config: CourierConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("COURIER_").split("_"))
            .extract()
            .map_err(|e| crate::error::CourierError::Config(e.to_string()))?;

        if config.telegram_mode == TelegramMode::Webhook && config.webhook_url.is_none() {
            return Err(crate::error::CourierError::Config(
                "telegram_mode = webhook requires webhook_url to be set".to_string(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_required_fields_and_defaults() {
        let f = write_config(
            r#"
            telegram_token = "tok"
            telegram_allowed_chat_ids = [1, 2, 3]
            "#,
        );
        let cfg = CourierConfig::load(Some(f.path().to_str().unwrap())).unwrap();
        assert_eq!(cfg.telegram_allowed_chat_ids, vec![1, 2, 3]);
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(cfg.debounce_delay, DEFAULT_DEBOUNCE_DELAY_SECS);
        assert_eq!(cfg.telegram_mode, TelegramMode::Polling);
    }

    #[test]
    fn webhook_mode_without_url_is_rejected() {
        let f = write_config(
            r#"
            telegram_token = "tok"
            telegram_allowed_chat_ids = [1]
            telegram_mode = "webhook"
            "#,
        );
        let result = CourierConfig::load(Some(f.path().to_str().unwrap()));
        assert!(result.is_err());
    }

    #[test]
    fn csv_chat_ids_are_parsed() {
        let f = write_config(
            r#"
            telegram_token = "tok"
            telegram_allowed_chat_ids = "10, 20,30"
            "#,
        );
        let cfg = CourierConfig::load(Some(f.path().to_str().unwrap())).unwrap();
        assert_eq!(cfg.telegram_allowed_chat_ids, vec![10, 20, 30]);
    }
}
