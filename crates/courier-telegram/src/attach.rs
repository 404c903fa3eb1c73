//! Voice message handling for the Telegram adapter.
//!
//! Downloads voice notes via `get_file` + `download_file` and hands the raw
//! OGG/Opus bytes to a pluggable [`Transcriber`].

use teloxide::net::Download;
use teloxide::prelude::*;
use tracing::warn;

/// Converts voice audio bytes into text. Implemented by a speech-to-text backend.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Option<String>;
}

/// Download a Telegram voice message's audio bytes via `get_file` + `download_file`.
///
/// Returns `None` on any network or API failure.
pub async fn download_voice(bot: &Bot, file_id: &str) -> Option<Vec<u8>> {
    let file = match bot.get_file(file_id).await {
        Ok(f) => f,
        Err(e) => {
            warn!(file_id, error = %e, "Telegram: get_file failed for voice message");
            return None;
        }
    };

    let mut buf: Vec<u8> = Vec::new();
    if let Err(e) = bot.download_file(&file.path, &mut buf).await {
        warn!(file_id, error = %e, "Telegram: download_file failed for voice message");
        return None;
    }

    Some(buf)
}

/// Yandex SpeechKit speech-to-text client.
pub struct SpeechKitTranscriber {
    client: reqwest::Client,
    api_key: String,
    folder_id: String,
    lang: String,
}

const RECOGNIZE_URL: &str = "https://stt.api.cloud.yandex.net/speech/v1/stt:recognize";

impl SpeechKitTranscriber {
    pub fn new(api_key: String, folder_id: String, lang: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            folder_id,
            lang: lang.unwrap_or_else(|| "ru-RU".to_string()),
        }
    }
}

#[async_trait::async_trait]
impl Transcriber for SpeechKitTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Option<String> {
        let response = self
            .client
            .post(RECOGNIZE_URL)
            .query(&[("folderId", self.folder_id.as_str()), ("lang", self.lang.as_str()), ("model", "general:rc")])
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .header("Content-Type", "audio/ogg")
            .body(audio.to_vec())
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "SpeechKit: request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "SpeechKit: non-success response");
            return None;
        }

        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "SpeechKit: failed to parse response body");
                return None;
            }
        };

        body.get("result").and_then(|v| v.as_str()).map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTranscriber(Option<String>);

    #[async_trait::async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> Option<String> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn transcriber_returns_configured_text() {
        let t = FixedTranscriber(Some("hello there".to_string()));
        assert_eq!(t.transcribe(&[1, 2, 3]).await, Some("hello there".to_string()));
    }

    #[tokio::test]
    async fn transcriber_can_signal_failure() {
        let t = FixedTranscriber(None);
        assert_eq!(t.transcribe(&[]).await, None);
    }
}
