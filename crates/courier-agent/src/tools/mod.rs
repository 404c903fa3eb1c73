pub mod memory_client;
pub mod todo_tools;
pub mod tool_loop;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::provider::ToolDefinition;

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String, String>> + Send>>;

/// A named, schema-described side effect the LLM may invoke.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: serde_json::Value) -> Result<String, String>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, String>> + Send + 'static,
{
    async fn call(&self, input: serde_json::Value) -> Result<String, String> {
        (self)(input).await
    }
}

struct ToolEntry {
    description: String,
    input_schema: serde_json::Value,
    handler: Arc<dyn ToolHandler>,
}

/// Name → handler registry. Dispatch results are always strings so they can
/// be fed back to the LLM as `tool_result` content, with errors returned
/// in-band as a JSON object rather than as a Rust `Err`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, description: impl Into<String>, input_schema: serde_json::Value, handler: Arc<dyn ToolHandler>) {
        self.tools.insert(
            name.into(),
            ToolEntry {
                description: description.into(),
                input_schema,
                handler,
            },
        );
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|(name, entry)| ToolDefinition {
                name: name.clone(),
                description: entry.description.clone(),
                input_schema: entry.input_schema.clone(),
            })
            .collect()
    }

    pub async fn dispatch(&self, name: &str, input: serde_json::Value) -> String {
        match self.tools.get(name) {
            None => serde_json::json!({ "error": format!("Unknown tool: {name}") }).to_string(),
            Some(entry) => match entry.handler.call(input).await {
                Ok(result) => result,
                Err(msg) => serde_json::json!({ "error": format!("Tool {name} failed: {msg}") }).to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_tool_returns_in_band_error() {
        let registry = ToolRegistry::new();
        let out = registry.dispatch("nonexistent", serde_json::json!({})).await;
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["error"], "Unknown tool: nonexistent");
    }

    #[tokio::test]
    async fn handler_error_is_wrapped_in_band() {
        let mut registry = ToolRegistry::new();
        registry.register(
            "boom",
            "always fails",
            serde_json::json!({}),
            Arc::new(|_input: serde_json::Value| async { Err("kaboom".to_string()) }),
        );
        let out = registry.dispatch("boom", serde_json::json!({})).await;
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["error"], "Tool boom failed: kaboom");
    }

    #[tokio::test]
    async fn successful_handler_returns_raw_string() {
        let mut registry = ToolRegistry::new();
        registry.register(
            "echo",
            "echoes input",
            serde_json::json!({}),
            Arc::new(|input: serde_json::Value| async move { Ok(input.to_string()) }),
        );
        let out = registry.dispatch("echo", serde_json::json!({"a": 1})).await;
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[test]
    fn definitions_reflect_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(
            "noop",
            "does nothing",
            serde_json::json!({"type": "object"}),
            Arc::new(|_: serde_json::Value| async { Ok("ok".to_string()) }),
        );
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "noop");
    }
}
