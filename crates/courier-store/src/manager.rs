use std::sync::Mutex;

use chrono::Utc;
use courier_core::types::{FallbackContext, OAuthTokenRecord, TodoItem, TodoPriority, TodoStatus, Turn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::error::Result;

/// SQLite-backed store for turns, fallback context, todos, and OAuth tokens.
///
/// Every public method offloads the blocking `rusqlite` call onto the Tokio
/// blocking threadpool via `spawn_blocking` so callers never stall the async
/// runtime on synchronous I/O.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        db::init_db(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_db(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub async fn save_turn(
        self: &std::sync::Arc<Self>,
        chat_id: String,
        user_text: String,
        bot_response: String,
        duration_ms: Option<i64>,
    ) -> Result<()> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.save_turn_sync(&chat_id, &user_text, &bot_response, duration_ms)).await??;
        Ok(())
    }

    fn save_turn_sync(&self, chat_id: &str, user_text: &str, bot_response: &str, duration_ms: Option<i64>) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO turns (chat_id, user_text, bot_response, duration_ms, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![chat_id, user_text, bot_response, duration_ms, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Returns the most recent `limit` turns in oldest-first order, each text
    /// field truncated to `max_chars`.
    pub async fn recent_turns(self: &std::sync::Arc<Self>, chat_id: String, limit: u32, max_chars: usize) -> Result<Vec<Turn>> {
        let this = self.clone();
        let turns = tokio::task::spawn_blocking(move || this.recent_turns_sync(&chat_id, limit, max_chars)).await??;
        Ok(turns)
    }

    fn recent_turns_sync(&self, chat_id: &str, limit: u32, max_chars: usize) -> rusqlite::Result<Vec<Turn>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, user_text, bot_response, duration_ms, created_at
             FROM turns WHERE chat_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut rows: Vec<Turn> = stmt
            .query_map(params![chat_id, limit], |row| {
                let created_at: String = row.get(5)?;
                Ok(Turn {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    user_text: truncate(&row.get::<_, String>(2)?, max_chars),
                    bot_response: truncate(&row.get::<_, String>(3)?, max_chars),
                    duration_ms: row.get(4)?,
                    created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        rows.reverse();
        Ok(rows)
    }

    pub async fn save_fallback(self: &std::sync::Arc<Self>, chat_id: String, stdout: String) -> Result<()> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.save_fallback_sync(&chat_id, &stdout)).await??;
        Ok(())
    }

    fn save_fallback_sync(&self, chat_id: &str, stdout: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO fallback_context (chat_id, stdout, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET stdout = excluded.stdout, updated_at = excluded.updated_at",
            params![chat_id, stdout, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Atomic get-and-delete: the fallback blob is consumed by exactly one read.
    pub async fn get_fallback(self: &std::sync::Arc<Self>, chat_id: String) -> Result<Option<FallbackContext>> {
        let this = self.clone();
        let ctx = tokio::task::spawn_blocking(move || this.get_fallback_sync(&chat_id)).await??;
        Ok(ctx)
    }

    fn get_fallback_sync(&self, chat_id: &str) -> rusqlite::Result<Option<FallbackContext>> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT chat_id, stdout, updated_at FROM fallback_context WHERE chat_id = ?1",
                params![chat_id],
                |row| {
                    let updated_at: String = row.get(2)?;
                    Ok(FallbackContext {
                        chat_id: row.get(0)?,
                        stdout: row.get(1)?,
                        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
                    })
                },
            )
            .optional()?;
        if found.is_some() {
            conn.execute("DELETE FROM fallback_context WHERE chat_id = ?1", params![chat_id])?;
        }
        Ok(found)
    }

    pub async fn clear_fallback(self: &std::sync::Arc<Self>, chat_id: String) -> Result<()> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.clear_fallback_sync(&chat_id)).await??;
        Ok(())
    }

    fn clear_fallback_sync(&self, chat_id: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM fallback_context WHERE chat_id = ?1", params![chat_id])?;
        Ok(())
    }

    pub async fn add_todo(
        self: &std::sync::Arc<Self>,
        chat_id: String,
        title: String,
        due_date: Option<String>,
        priority: TodoPriority,
    ) -> Result<i64> {
        let this = self.clone();
        let id = tokio::task::spawn_blocking(move || this.add_todo_sync(&chat_id, &title, due_date.as_deref(), priority)).await??;
        Ok(id)
    }

    fn add_todo_sync(&self, chat_id: &str, title: &str, due_date: Option<&str>, priority: TodoPriority) -> rusqlite::Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO todos (chat_id, title, due_date, priority, status, created_at) VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![chat_id, title, due_date, priority.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn list_todos(self: &std::sync::Arc<Self>, chat_id: String) -> Result<Vec<TodoItem>> {
        let this = self.clone();
        let items = tokio::task::spawn_blocking(move || this.list_todos_sync(&chat_id)).await??;
        Ok(items)
    }

    fn list_todos_sync(&self, chat_id: &str) -> rusqlite::Result<Vec<TodoItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, title, due_date, priority, status, created_at, completed_at
             FROM todos WHERE chat_id = ?1
             ORDER BY CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 WHEN 'low' THEN 3 END,
                      due_date IS NULL, due_date ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![chat_id], |row| {
                let created_at: String = row.get(6)?;
                let completed_at: Option<String> = row.get(7)?;
                let priority: String = row.get(4)?;
                let status: String = row.get(5)?;
                Ok(TodoItem {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    title: row.get(2)?,
                    due_date: row.get(3)?,
                    priority: priority.parse().unwrap_or(TodoPriority::Medium),
                    status: status.parse().unwrap_or(TodoStatus::Pending),
                    created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
                    completed_at: completed_at.and_then(|s| s.parse().ok()),
                })
            })?
            .collect();
        rows
    }

    pub async fn complete_todo(self: &std::sync::Arc<Self>, id: i64) -> Result<bool> {
        let this = self.clone();
        let changed = tokio::task::spawn_blocking(move || this.complete_todo_sync(id)).await??;
        Ok(changed)
    }

    fn complete_todo_sync(&self, id: i64) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE todos SET status = 'done', completed_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    pub async fn delete_todo(self: &std::sync::Arc<Self>, id: i64) -> Result<bool> {
        let this = self.clone();
        let changed = tokio::task::spawn_blocking(move || this.delete_todo_sync(id)).await??;
        Ok(changed)
    }

    fn delete_todo_sync(&self, id: i64) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub async fn upsert_oauth_token(self: &std::sync::Arc<Self>, service: String, token_json: String) -> Result<()> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.upsert_oauth_token_sync(&service, &token_json)).await??;
        Ok(())
    }

    fn upsert_oauth_token_sync(&self, service: &str, token_json: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO oauth_tokens (service, token_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(service) DO UPDATE SET token_json = excluded.token_json, updated_at = excluded.updated_at",
            params![service, token_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn get_oauth_token(self: &std::sync::Arc<Self>, service: String) -> Result<Option<OAuthTokenRecord>> {
        let this = self.clone();
        let rec = tokio::task::spawn_blocking(move || this.get_oauth_token_sync(&service)).await??;
        Ok(rec)
    }

    fn get_oauth_token_sync(&self, service: &str) -> rusqlite::Result<Option<OAuthTokenRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT service, token_json, updated_at FROM oauth_tokens WHERE service = ?1",
            params![service],
            |row| {
                let updated_at: String = row.get(2)?;
                Ok(OAuthTokenRecord {
                    service: row.get(0)?,
                    token_json: row.get(1)?,
                    updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
                })
            },
        )
        .optional()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> Arc<HistoryStore> {
        Arc::new(HistoryStore::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn turn_ordering_is_oldest_first() {
        let store = store();
        for i in 0..5 {
            store.save_turn("chat1".into(), format!("u{i}"), format!("b{i}"), None).await.unwrap();
        }
        let turns = store.recent_turns("chat1".into(), 3, 500).await.unwrap();
        let texts: Vec<_> = turns.iter().map(|t| t.user_text.clone()).collect();
        assert_eq!(texts, vec!["u2", "u3", "u4"]);
    }

    #[tokio::test]
    async fn history_truncation_applies_max_chars() {
        let store = store();
        let long = "x".repeat(1000);
        store.save_turn("chat1".into(), long.clone(), long.clone(), None).await.unwrap();
        let turns = store.recent_turns("chat1".into(), 1, 500).await.unwrap();
        assert_eq!(turns[0].user_text.len(), 500);
        assert_eq!(turns[0].bot_response.len(), 500);
    }

    #[tokio::test]
    async fn fallback_is_consumed_on_read() {
        let store = store();
        store.save_fallback("chat1".into(), "recovery hint".into()).await.unwrap();
        let first = store.get_fallback("chat1".into()).await.unwrap();
        assert_eq!(first.unwrap().stdout, "recovery hint");
        let second = store.get_fallback("chat1".into()).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn fallback_resave_overwrites_before_read() {
        let store = store();
        store.save_fallback("chat1".into(), "first".into()).await.unwrap();
        store.save_fallback("chat1".into(), "second".into()).await.unwrap();
        let ctx = store.get_fallback("chat1".into()).await.unwrap().unwrap();
        assert_eq!(ctx.stdout, "second");
    }

    #[tokio::test]
    async fn todos_sort_by_priority_then_due_date_then_id() {
        let store = store();
        store.add_todo("chat1".into(), "low one".into(), None, TodoPriority::Low).await.unwrap();
        store
            .add_todo("chat1".into(), "high no date".into(), None, TodoPriority::High)
            .await
            .unwrap();
        store
            .add_todo("chat1".into(), "high dated".into(), Some("2026-01-01".into()), TodoPriority::High)
            .await
            .unwrap();
        let items = store.list_todos("chat1".into()).await.unwrap();
        let titles: Vec<_> = items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["high dated", "high no date", "low one"]);
    }

    #[tokio::test]
    async fn complete_todo_sets_status_and_completed_at() {
        let store = store();
        let id = store.add_todo("chat1".into(), "task".into(), None, TodoPriority::Medium).await.unwrap();
        assert!(store.complete_todo(id).await.unwrap());
        let items = store.list_todos("chat1".into()).await.unwrap();
        assert_eq!(items[0].status, TodoStatus::Done);
        assert!(items[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn oauth_token_upsert_then_get() {
        let store = store();
        store.upsert_oauth_token("google_calendar".into(), "{}".into()).await.unwrap();
        let rec = store.get_oauth_token("google_calendar".into()).await.unwrap().unwrap();
        assert_eq!(rec.token_json, "{}");
    }
}
