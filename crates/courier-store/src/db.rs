use rusqlite::{Connection, Result};

/// Create tables/indexes. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_turns_table(conn)?;
    create_fallback_context_table(conn)?;
    create_todos_table(conn)?;
    create_oauth_tokens_table(conn)?;
    Ok(())
}

fn create_turns_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS turns (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id      TEXT NOT NULL,
            user_text    TEXT NOT NULL,
            bot_response TEXT NOT NULL,
            duration_ms  INTEGER,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_turns_chat_id ON turns(chat_id);
        CREATE INDEX IF NOT EXISTS idx_turns_created_at ON turns(created_at);",
    )
}

fn create_fallback_context_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS fallback_context (
            chat_id    TEXT PRIMARY KEY,
            stdout     TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
}

fn create_todos_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS todos (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id      TEXT NOT NULL,
            title        TEXT NOT NULL,
            due_date     TEXT,
            priority     TEXT NOT NULL DEFAULT 'medium',
            status       TEXT NOT NULL DEFAULT 'pending',
            created_at   TEXT NOT NULL,
            completed_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_todos_chat_id ON todos(chat_id);",
    )
}

fn create_oauth_tokens_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS oauth_tokens (
            service    TEXT PRIMARY KEY,
            token_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
}
