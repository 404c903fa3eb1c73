use crate::provider::{ChatRequest, LlmProvider, ProviderError};
use crate::tools::ToolRegistry;

pub const MAX_TOOL_ROUNDS: u32 = 20;

/// Drives the tool-use dialog: call the backend, dispatch any tool-use
/// blocks through the registry, feed results back, and repeat until the
/// backend stops asking for tools or the round cap is hit.
pub async fn run_tool_loop(provider: &dyn LlmProvider, mut request: ChatRequest, registry: &ToolRegistry) -> Result<String, ProviderError> {
    let mut accumulated = String::new();

    for _round in 0..MAX_TOOL_ROUNDS {
        let response = provider.send(&request).await?;
        if !accumulated.is_empty() && !response.content.is_empty() {
            accumulated.push('\n');
        }
        accumulated.push_str(&response.content);

        if response.tool_calls.is_empty() || response.stop_reason == "end_turn" {
            return Ok(if accumulated.trim().is_empty() {
                "(no response)".to_string()
            } else {
                accumulated
            });
        }

        request.raw_messages.push(serde_json::json!({
            "role": "assistant",
            "content": response.raw_content,
        }));

        let mut tool_results = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            let result = registry.dispatch(&call.name, call.input.clone()).await;
            tool_results.push(serde_json::json!({
                "type": "tool_result",
                "tool_use_id": call.id,
                "content": result,
            }));
        }
        request.raw_messages.push(serde_json::json!({
            "role": "user",
            "content": tool_results,
        }));
    }

    Ok(if accumulated.trim().is_empty() {
        "(max tool rounds reached)".to_string()
    } else {
        accumulated
    })
}
