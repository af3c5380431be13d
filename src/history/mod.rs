//! Per-session conversation history with a bounded window.
//!
//! Only user/assistant exchanges are stored; tool turns live and die
//! inside a single generation run and have no write path here. The window
//! is a deliberately lossy policy: older exchanges are dropped, never
//! summarized.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::AssistantError;
use crate::llm::types::{ChatMessage, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn with_path(db_path: impl AsRef<Path>) -> Result<Self, AssistantError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(AssistantError::storage)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), AssistantError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(AssistantError::storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(AssistantError::storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id)")
            .execute(&self.pool)
            .await
            .map_err(AssistantError::storage)?;

        Ok(())
    }

    /// Mint a fresh session id and register it.
    pub async fn create_session(&self) -> Result<String, AssistantError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO sessions (id, created_at, updated_at) VALUES (?1, ?2, ?3)")
            .bind(&session_id)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(AssistantError::storage)?;

        Ok(session_id)
    }

    /// Commit one completed exchange. Both rows go in a single transaction
    /// so concurrent queries on the same session can never interleave half
    /// an exchange, and the session auto-creates on first append.
    pub async fn append_exchange(
        &self,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(), AssistantError> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await.map_err(AssistantError::storage)?;

        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at, updated_at) VALUES (?1, ?2, ?3)")
            .bind(session_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(AssistantError::storage)?;

        sqlx::query("UPDATE sessions SET updated_at = ?1 WHERE id = ?2")
            .bind(&now)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(AssistantError::storage)?;

        for (role, content) in [("user", user_text), ("assistant", assistant_text)] {
            sqlx::query(
                "INSERT INTO messages (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(session_id)
            .bind(role)
            .bind(content)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(AssistantError::storage)?;
        }

        tx.commit().await.map_err(AssistantError::storage)?;
        Ok(())
    }

    /// The last `window` exchanges in chronological order. Unknown ids are
    /// empty histories, never errors.
    pub async fn get_history(
        &self,
        session_id: &str,
        window: usize,
    ) -> Result<Vec<ChatMessage>, AssistantError> {
        if window == 0 {
            return Ok(Vec::new());
        }
        let limit = (window * 2) as i64;

        let rows = sqlx::query(
            "SELECT role, content FROM (
                SELECT id, role, content FROM messages
                WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id ASC",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AssistantError::storage)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.get("role");
            let role = match role.as_str() {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                "system" => Role::System,
                "tool" => Role::Tool,
                _ => continue,
            };
            messages.push(ChatMessage {
                role,
                content: row.get("content"),
            });
        }

        Ok(messages)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, AssistantError> {
        let rows = sqlx::query(
            "SELECT s.id, s.created_at, s.updated_at, COUNT(m.id) AS msg_count
             FROM sessions s
             LEFT JOIN messages m ON s.id = m.session_id
             GROUP BY s.id
             ORDER BY s.updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AssistantError::storage)?;

        Ok(rows
            .iter()
            .map(|row| SessionInfo {
                id: row.get("id"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                message_count: row.get("msg_count"),
            })
            .collect())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, AssistantError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(AssistantError::storage)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> HistoryStore {
        let tmp = std::env::temp_dir().join(format!(
            "lectern-history-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        HistoryStore::with_path(tmp).await.unwrap()
    }

    #[tokio::test]
    async fn unknown_session_has_empty_history() {
        let store = test_store().await;
        let history = store.get_history("no-such-session", 2).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn window_caps_visible_exchanges() {
        let store = test_store().await;
        let session = store.create_session().await.unwrap();

        for i in 1..=5 {
            store
                .append_exchange(&session, &format!("question {}", i), &format!("answer {}", i))
                .await
                .unwrap();
        }

        let history = store.get_history(&session, 2).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "question 4");
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[3].content, "answer 5");
        assert_eq!(history[3].role, Role::Assistant);
    }

    #[tokio::test]
    async fn exchanges_stay_in_submission_order() {
        let store = test_store().await;
        let session = store.create_session().await.unwrap();

        store.append_exchange(&session, "first q", "first a").await.unwrap();
        store.append_exchange(&session, "second q", "second a").await.unwrap();

        let history = store.get_history(&session, 10).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first q", "first a", "second q", "second a"]);
    }

    #[tokio::test]
    async fn append_auto_creates_unknown_sessions() {
        let store = test_store().await;

        store
            .append_exchange("client-chosen-id", "hello", "hi there")
            .await
            .unwrap();

        let history = store.get_history("client-chosen-id", 2).await.unwrap();
        assert_eq!(history.len(), 2);

        let sessions = store.list_sessions().await.unwrap();
        assert!(sessions.iter().any(|s| s.id == "client-chosen-id"));
    }

    #[tokio::test]
    async fn delete_session_cascades_to_messages() {
        let store = test_store().await;
        let session = store.create_session().await.unwrap();
        store.append_exchange(&session, "q", "a").await.unwrap();

        assert!(store.delete_session(&session).await.unwrap());
        assert!(store.get_history(&session, 10).await.unwrap().is_empty());
        assert!(!store.delete_session(&session).await.unwrap());
    }

    #[tokio::test]
    async fn zero_window_hides_everything() {
        let store = test_store().await;
        let session = store.create_session().await.unwrap();
        store.append_exchange(&session, "q", "a").await.unwrap();

        assert!(store.get_history(&session, 0).await.unwrap().is_empty());
    }
}
