use std::sync::Arc;

use serde::Deserialize;

use crate::tools::ToolRegistry;

/// JSON-RPC 2.0 client for the external knowledge-graph memory backend.
#[derive(Clone)]
pub struct GraphitiMemoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl GraphitiMemoryClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Calls `tools/call` with the given tool name and arguments, returning
    /// the concatenated text content of the result.
    pub async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<String, String> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments },
        });

        let resp = self
            .client
            .post(format!("{}/rpc", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("memory backend returned status {}", resp.status()));
        }

        let parsed: RpcResponse = resp.json().await.map_err(|e| e.to_string())?;
        if let Some(err) = parsed.error {
            return Err(err.message);
        }
        let result = parsed.result.ok_or_else(|| "memory backend returned no result".to_string())?;
        let text = result.content.into_iter().map(|c| c.text).collect::<Vec<_>>().join("\n");
        Ok(text)
    }

    pub async fn get_episodes(&self, chat_id: &str) -> Result<String, String> {
        self.call_tool("get_episodes", serde_json::json!({ "group_id": chat_id })).await
    }

    pub async fn search_memory_facts(&self, chat_id: &str, query: &str) -> Result<String, String> {
        self.call_tool("search_memory_facts", serde_json::json!({ "group_id": chat_id, "query": query })).await
    }

    pub async fn search_nodes(&self, chat_id: &str, query: &str) -> Result<String, String> {
        self.call_tool("search_nodes", serde_json::json!({ "group_id": chat_id, "query": query })).await
    }

    pub async fn add_memory(&self, chat_id: &str, content: &str) -> Result<String, String> {
        self.call_tool("add_memory", serde_json::json!({ "group_id": chat_id, "content": content })).await
    }

    /// Registers the memory-backend tools (`get_episodes`, `search_memory_facts`,
    /// `search_nodes`, `add_memory`) against a chat-scoped group id.
    pub fn register_tools(&self, registry: &mut ToolRegistry, chat_id: String) {
        let client = self.clone();
        let id = chat_id.clone();
        registry.register(
            "get_episodes",
            "List recent memory episodes for this chat.",
            serde_json::json!({ "type": "object", "properties": {} }),
            Arc::new(move |_input: serde_json::Value| {
                let client = client.clone();
                let chat_id = id.clone();
                async move { client.get_episodes(&chat_id).await }
            }),
        );

        let client = self.clone();
        let id = chat_id.clone();
        registry.register(
            "search_memory_facts",
            "Search remembered facts for this chat. input: {query}",
            serde_json::json!({
                "type": "object",
                "properties": { "query": {"type": "string"} },
                "required": ["query"],
            }),
            Arc::new(move |input: serde_json::Value| {
                let client = client.clone();
                let chat_id = id.clone();
                async move {
                    let query = input.get("query").and_then(|v| v.as_str()).ok_or("missing query")?;
                    client.search_memory_facts(&chat_id, query).await
                }
            }),
        );

        let client = self.clone();
        let id = chat_id.clone();
        registry.register(
            "search_nodes",
            "Search remembered entities for this chat. input: {query}",
            serde_json::json!({
                "type": "object",
                "properties": { "query": {"type": "string"} },
                "required": ["query"],
            }),
            Arc::new(move |input: serde_json::Value| {
                let client = client.clone();
                let chat_id = id.clone();
                async move {
                    let query = input.get("query").and_then(|v| v.as_str()).ok_or("missing query")?;
                    client.search_nodes(&chat_id, query).await
                }
            }),
        );

        let client = self.clone();
        registry.register(
            "add_memory",
            "Store a new memory for this chat. input: {content}",
            serde_json::json!({
                "type": "object",
                "properties": { "content": {"type": "string"} },
                "required": ["content"],
            }),
            Arc::new(move |input: serde_json::Value| {
                let client = client.clone();
                let chat_id = chat_id.clone();
                async move {
                    let content = input.get("content").and_then(|v| v.as_str()).ok_or("missing content")?;
                    client.add_memory(&chat_id, content).await
                }
            }),
        );
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<RpcResult>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcResult {
    content: Vec<RpcContent>,
}

#[derive(Deserialize)]
struct RpcContent {
    text: String,
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_response_parses_result_text() {
        let raw = r#"{"result":{"content":[{"type":"text","text":"hello"}]}}"#;
        let parsed: RpcResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.unwrap().content[0].text, "hello");
    }

    #[test]
    fn rpc_response_parses_error() {
        let raw = r#"{"error":{"code":-1,"message":"boom"}}"#;
        let parsed: RpcResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.unwrap().message, "boom");
    }
}
