use std::sync::Arc;

use courier_core::types::TodoPriority;
use courier_store::HistoryStore;

use crate::tools::ToolRegistry;

/// Registers the in-core todo tools (`todo_add`, `todo_list`, `todo_complete`)
/// against a chat-scoped store, so the LLM can manage a chat's task list
/// without a separate out-of-process collaborator.
pub fn register_todo_tools(registry: &mut ToolRegistry, store: Arc<HistoryStore>, chat_id: String) {
    let add_store = store.clone();
    let add_chat = chat_id.clone();
    registry.register(
        "todo_add",
        "Add a todo item for this chat. input: {title, due_date?, priority?}",
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "due_date": {"type": "string"},
                "priority": {"type": "string", "enum": ["high", "medium", "low"]},
            },
            "required": ["title"],
        }),
        Arc::new(move |input: serde_json::Value| {
            let store = add_store.clone();
            let chat_id = add_chat.clone();
            async move {
                let title = input.get("title").and_then(|v| v.as_str()).ok_or("missing title")?.to_string();
                let due_date = input.get("due_date").and_then(|v| v.as_str()).map(String::from);
                let priority = input
                    .get("priority")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<TodoPriority>().ok())
                    .unwrap_or(TodoPriority::Medium);
                let id = store.add_todo(chat_id, title, due_date, priority).await.map_err(|e| e.to_string())?;
                Ok(serde_json::json!({ "id": id }).to_string())
            }
        }),
    );

    let list_store = store.clone();
    let list_chat = chat_id.clone();
    registry.register(
        "todo_list",
        "List todo items for this chat, sorted by priority then due date.",
        serde_json::json!({ "type": "object", "properties": {} }),
        Arc::new(move |_input: serde_json::Value| {
            let store = list_store.clone();
            let chat_id = list_chat.clone();
            async move {
                let items = store.list_todos(chat_id).await.map_err(|e| e.to_string())?;
                serde_json::to_string(&items).map_err(|e| e.to_string())
            }
        }),
    );

    registry.register(
        "todo_complete",
        "Mark a todo item as done. input: {id}",
        serde_json::json!({
            "type": "object",
            "properties": { "id": {"type": "integer"} },
            "required": ["id"],
        }),
        Arc::new(move |input: serde_json::Value| {
            let store = store.clone();
            async move {
                let id = input.get("id").and_then(|v| v.as_i64()).ok_or("missing id")?;
                let found = store.complete_todo(id).await.map_err(|e| e.to_string())?;
                Ok(serde_json::json!({ "completed": found }).to_string())
            }
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn todo_tools_round_trip_through_the_registry() {
        let store = Arc::new(HistoryStore::open_in_memory().unwrap());
        let mut registry = ToolRegistry::new();
        register_todo_tools(&mut registry, store, "chat1".to_string());

        let add_out = registry.dispatch("todo_add", serde_json::json!({"title": "buy milk"})).await;
        let parsed: serde_json::Value = serde_json::from_str(&add_out).unwrap();
        let id = parsed["id"].as_i64().unwrap();

        let list_out = registry.dispatch("todo_list", serde_json::json!({})).await;
        assert!(list_out.contains("buy milk"));

        let complete_out = registry.dispatch("todo_complete", serde_json::json!({"id": id})).await;
        assert!(complete_out.contains("\"completed\":true"));
    }
}
