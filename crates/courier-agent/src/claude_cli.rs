use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

const RESUME_PROMPT: &str = "Continue. If you already answered, repeat your final response.";

/// Shape 2 backend: a spawned CLI producing a line-delimited JSON event stream
/// (`system` / `assistant` / `result`) instead of a single structured response.
pub struct SubprocessProvider {
    command: String,
    mcp_config_path: Option<String>,
    call_timeout: Duration,
}

impl SubprocessProvider {
    pub fn new(command: String, mcp_config_path: Option<String>, call_timeout: Duration) -> Self {
        Self {
            command,
            mcp_config_path,
            call_timeout,
        }
    }

    async fn invoke(&self, prompt: &str, model: &str, resume_session: Option<&str>) -> Result<CliOutcome, ProviderError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("-p")
            .arg("--model")
            .arg(model)
            .arg("--allowedTools")
            .arg("mcp__*")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(session_id) = resume_session {
            cmd.arg("--output-format").arg("json").arg("--resume").arg(session_id);
        } else {
            cmd.arg("--output-format").arg("stream-json").arg("--verbose");
        }

        if let Some(ref path) = self.mcp_config_path {
            cmd.arg("--mcp-config").arg(path);
        }

        let mut child = cmd.spawn()?;
        {
            let mut stdin = child.stdin.take().expect("piped stdin");
            use tokio::io::AsyncWriteExt;
            stdin.write_all(prompt.as_bytes()).await?;
        }
        let stdout = child.stdout.take().expect("piped stdout");
        let mut reader = BufReader::new(stdout).lines();

        let mut session_id: Option<String> = None;
        let mut final_text = String::new();

        while let Some(line) = reader.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CliEvent>(&line) {
                Ok(CliEvent::System { session_id: sid }) => session_id = Some(sid),
                Ok(CliEvent::Assistant { .. }) => {}
                Ok(CliEvent::Result { result, session_id: sid }) => {
                    final_text = result;
                    if sid.is_some() {
                        session_id = sid;
                    }
                }
                Err(_) => debug!(line = %line, "ignoring unparseable CLI output line"),
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let mut stderr_buf = Vec::new();
            if let Some(mut stderr) = child.stderr.take() {
                use tokio::io::AsyncReadExt;
                let _ = stderr.read_to_end(&mut stderr_buf).await;
            }
            let snippet = String::from_utf8_lossy(&stderr_buf);
            return Err(ProviderError::Api {
                status: status.code().unwrap_or(-1) as u16,
                message: snippet.to_string(),
            });
        }

        Ok(CliOutcome { text: final_text, session_id })
    }
}

#[async_trait]
impl LlmProvider for SubprocessProvider {
    fn name(&self) -> &str {
        "claude-cli"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let prompt = req
            .raw_messages
            .last()
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or(&req.system)
            .to_string();

        let outcome = tokio::time::timeout(self.call_timeout, self.invoke(&prompt, &req.model, None))
            .await
            .map_err(|_| ProviderError::Timeout { ms: self.call_timeout.as_millis() as u64 })??;

        let text = if outcome.text.trim().is_empty() {
            match outcome.session_id.as_deref() {
                Some(session_id) => {
                    warn!(session_id, "empty result, attempting one resume");
                    let resumed = self.invoke(RESUME_PROMPT, &req.model, Some(session_id)).await?;
                    resumed.text
                }
                None => String::new(),
            }
        } else {
            outcome.text
        };

        let text = if text.trim().is_empty() { "(no response)".to_string() } else { text };

        Ok(ChatResponse {
            content: text.clone(),
            model: req.model.clone(),
            tokens_in: 0,
            tokens_out: 0,
            stop_reason: "end_turn".to_string(),
            tool_calls: Vec::new(),
            raw_content: serde_json::json!([{ "type": "text", "text": text }]),
        })
    }
}

struct CliOutcome {
    text: String,
    session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum CliEvent {
    #[serde(rename = "system")]
    System { session_id: String },
    #[serde(rename = "assistant")]
    Assistant {
        #[serde(default)]
        #[allow(dead_code)]
        message: serde_json::Value,
    },
    #[serde(rename = "result")]
    Result {
        result: String,
        #[serde(default)]
        session_id: Option<String>,
    },
}

/// Strips an MCP bridge tool name (`mcp__<server>__<tool>`) down to `<tool>`.
pub fn strip_mcp_prefix(name: &str) -> &str {
    name.rsplit("__").next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mcp_prefix_keeps_bare_tool_name() {
        assert_eq!(strip_mcp_prefix("mcp__graphiti__search_nodes"), "search_nodes");
        assert_eq!(strip_mcp_prefix("plain_tool"), "plain_tool");
    }

    #[test]
    fn parses_system_assistant_and_result_events() {
        let system: CliEvent = serde_json::from_str(r#"{"type":"system","session_id":"abc"}"#).unwrap();
        assert!(matches!(system, CliEvent::System { session_id } if session_id == "abc"));

        let result: CliEvent = serde_json::from_str(r#"{"type":"result","result":"hi","session_id":"abc"}"#).unwrap();
        assert!(matches!(result, CliEvent::Result { result, .. } if result == "hi"));
    }
}
