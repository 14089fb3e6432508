//! Conversation memory store
//!
//! Persists sessions and their append-only message history in SQL tables.
//! The message id assigned on insert is the ordering authority, so concurrent
//! turns on the same session are ordered by when they were persisted.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::sqlite::SqlitePool;

use crate::core::{AgentError, AgentResult};

use super::metadata::{Role, SessionRecord, SessionSummary, StoredMessage};

/// Session table name
pub const SESSION_TABLE: &str = "chat_session";

/// Default message table name
pub const DEFAULT_MESSAGE_TABLE: &str = "chat_message";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("static regex is valid"));

/// SQL-backed history store
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
    message_table: String,
}

impl HistoryStore {
    /// Create a store using the default message table
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            message_table: DEFAULT_MESSAGE_TABLE.to_string(),
        }
    }

    /// Create a store with a custom message table name
    pub fn with_message_table(pool: SqlitePool, table: impl Into<String>) -> AgentResult<Self> {
        let table = table.into();
        if !IDENTIFIER.is_match(&table) || table.eq_ignore_ascii_case(SESSION_TABLE) {
            return Err(AgentError::InvalidConfig(format!(
                "invalid history table name: {:?}",
                table
            )));
        }
        Ok(Self {
            pool,
            message_table: table,
        })
    }

    /// Name of the message table
    pub fn message_table(&self) -> &str {
        &self.message_table
    }

    /// Tables owned by this store (hidden from the planner)
    pub fn owned_tables(&self) -> Vec<String> {
        vec![SESSION_TABLE.to_string(), self.message_table.clone()]
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the history tables if they do not exist
    pub async fn init(&self) -> AgentResult<()> {
        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {SESSION_TABLE} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL UNIQUE,
                    user_label TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL REFERENCES {SESSION_TABLE}(session_id) ON DELETE CASCADE,
                    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )",
                table = self.message_table
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_session ON {table} (session_id, id)",
                table = self.message_table
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(AgentError::persistence)?;
        }

        tracing::info!(
            "[HistoryStore] Ready (tables: {}, {})",
            SESSION_TABLE,
            self.message_table
        );
        Ok(())
    }

    /// Look up a session
    pub async fn find_session(&self, session_id: &str) -> AgentResult<Option<SessionRecord>> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT session_id, user_label, created_at FROM {SESSION_TABLE} WHERE session_id = ?1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AgentError::persistence)
    }

    /// Return the session, creating it on first use
    pub async fn get_or_create(&self, session_id: &str) -> AgentResult<SessionRecord> {
        sqlx::query(&format!(
            "INSERT INTO {SESSION_TABLE} (session_id, user_label, created_at) VALUES (?1, '', ?2)
             ON CONFLICT(session_id) DO NOTHING"
        ))
        .bind(session_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(AgentError::persistence)?;

        self.find_session(session_id)
            .await?
            .ok_or_else(|| AgentError::Persistence(format!("session vanished: {}", session_id)))
    }

    /// Create a session or update its label.
    ///
    /// Returns the record and whether it was created. A `None` label never
    /// touches an existing label.
    pub async fn upsert_session(
        &self,
        session_id: &str,
        label: Option<&str>,
    ) -> AgentResult<(SessionRecord, bool)> {
        let created = sqlx::query(&format!(
            "INSERT INTO {SESSION_TABLE} (session_id, user_label, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO NOTHING"
        ))
        .bind(session_id)
        .bind(label.unwrap_or(""))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(AgentError::persistence)?
        .rows_affected()
            > 0;

        if !created {
            if let Some(label) = label {
                sqlx::query(&format!(
                    "UPDATE {SESSION_TABLE} SET user_label = ?2 WHERE session_id = ?1"
                ))
                .bind(session_id)
                .bind(label)
                .execute(&self.pool)
                .await
                .map_err(AgentError::persistence)?;
            }
        }

        let record = self
            .find_session(session_id)
            .await?
            .ok_or_else(|| AgentError::Persistence(format!("session vanished: {}", session_id)))?;
        Ok((record, created))
    }

    /// Durably append one message, creating the session if needed
    pub async fn append(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> AgentResult<StoredMessage> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(AgentError::persistence)?;

        sqlx::query(&format!(
            "INSERT INTO {SESSION_TABLE} (session_id, user_label, created_at) VALUES (?1, '', ?2)
             ON CONFLICT(session_id) DO NOTHING"
        ))
        .bind(session_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AgentError::persistence)?;

        let id = sqlx::query(&format!(
            "INSERT INTO {} (session_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            self.message_table
        ))
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AgentError::persistence)?
        .last_insert_rowid();

        tx.commit().await.map_err(AgentError::persistence)?;

        tracing::debug!(
            "[HistoryStore] Appended {} message #{} to session {}",
            role,
            id,
            session_id
        );

        Ok(StoredMessage {
            id,
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// The most recent `limit` messages of a session, oldest first.
    ///
    /// Unknown sessions yield an empty list.
    pub async fn recent(&self, session_id: &str, limit: usize) -> AgentResult<Vec<StoredMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, StoredMessage>(&format!(
            "SELECT id, session_id, role, content, created_at FROM (
                SELECT id, session_id, role, content, created_at FROM {table}
                WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id ASC",
            table = self.message_table
        ))
        .bind(session_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(AgentError::persistence)
    }

    /// Full message history of a session, oldest first
    pub async fn messages(&self, session_id: &str) -> AgentResult<Vec<StoredMessage>> {
        if self.find_session(session_id).await?.is_none() {
            return Err(AgentError::SessionNotFound(session_id.to_string()));
        }

        sqlx::query_as::<_, StoredMessage>(&format!(
            "SELECT id, session_id, role, content, created_at FROM {} WHERE session_id = ?1 ORDER BY id ASC",
            self.message_table
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AgentError::persistence)
    }

    /// All sessions, most recently active first
    pub async fn list_sessions(&self) -> AgentResult<Vec<SessionSummary>> {
        let mut sessions = sqlx::query_as::<_, SessionSummary>(&format!(
            "SELECT s.session_id, s.user_label, s.created_at,
                    MAX(m.created_at) AS last_message_at,
                    COUNT(m.id) AS message_count
             FROM {SESSION_TABLE} s
             LEFT JOIN {table} m ON m.session_id = s.session_id
             GROUP BY s.id, s.session_id, s.user_label, s.created_at",
            table = self.message_table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AgentError::persistence)?;

        sessions.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        Ok(sessions)
    }

    /// Delete a session and all of its messages.
    ///
    /// Returns false when the session did not exist.
    pub async fn delete_session(&self, session_id: &str) -> AgentResult<bool> {
        let mut tx = self.pool.begin().await.map_err(AgentError::persistence)?;

        let removed_messages = sqlx::query(&format!(
            "DELETE FROM {} WHERE session_id = ?1",
            self.message_table
        ))
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(AgentError::persistence)?
        .rows_affected();

        let removed = sqlx::query(&format!("DELETE FROM {SESSION_TABLE} WHERE session_id = ?1"))
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(AgentError::persistence)?
            .rows_affected()
            > 0;

        tx.commit().await.map_err(AgentError::persistence)?;

        if removed {
            tracing::info!(
                "[HistoryStore] Deleted session {} ({} messages)",
                session_id,
                removed_messages
            );
        }
        Ok(removed)
    }

    /// Time of the newest message across all sessions
    pub async fn last_message_at(&self) -> AgentResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, DateTime<Utc>>(&format!(
            "SELECT created_at FROM {} ORDER BY id DESC LIMIT 1",
            self.message_table
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(AgentError::persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_store() -> HistoryStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = HistoryStore::new(pool);
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_append_recent_round_trip() {
        let store = create_test_store().await;

        let contents = ["¿Cuántos agentes hay en Lima?", "Hay 2 agentes en Lima.", "¿Y en Arequipa?", "Hay 1."];
        for (i, content) in contents.iter().enumerate() {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store.append("s1", role, content).await.unwrap();
        }

        let messages = store.recent("s1", contents.len()).await.unwrap();
        assert_eq!(messages.len(), 4);
        for (i, msg) in messages.iter().enumerate() {
            assert_eq!(msg.content, contents[i]);
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(msg.role, expected);
        }
    }

    #[tokio::test]
    async fn test_recent_returns_tail_oldest_first() {
        let store = create_test_store().await;
        for i in 0..5 {
            store.append("s1", Role::User, &format!("m{}", i)).await.unwrap();
        }

        let tail = store.recent("s1", 2).await.unwrap();
        let contents: Vec<&str> = tail.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);

        assert!(store.recent("s1", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_unknown_session_is_empty() {
        let store = create_test_store().await;
        assert!(store.recent("nobody", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = create_test_store().await;
        store.append("a", Role::User, "from a").await.unwrap();
        store.append("b", Role::User, "from b").await.unwrap();

        let a = store.recent("a", 10).await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "from a");
    }

    #[tokio::test]
    async fn test_upsert_without_label_keeps_label() {
        let store = create_test_store().await;

        let (record, created) = store.upsert_session("s1", Some("Ventas")).await.unwrap();
        assert!(created);
        assert_eq!(record.user_label, "Ventas");

        let (record, created) = store.upsert_session("s1", None).await.unwrap();
        assert!(!created);
        assert_eq!(record.user_label, "Ventas");

        let (record, created) = store.upsert_session("s1", Some("Cobranzas")).await.unwrap();
        assert!(!created);
        assert_eq!(record.user_label, "Cobranzas");
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = create_test_store().await;
        store.upsert_session("s1", Some("label")).await.unwrap();

        let first = store.get_or_create("s1").await.unwrap();
        let second = store.get_or_create("s1").await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.user_label, "label");
    }

    #[tokio::test]
    async fn test_messages_unknown_session() {
        let store = create_test_store().await;
        assert!(matches!(
            store.messages("ghost").await,
            Err(AgentError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = create_test_store().await;
        store.append("s1", Role::User, "hola").await.unwrap();
        store.append("s1", Role::Assistant, "hola!").await.unwrap();

        assert!(store.delete_session("s1").await.unwrap());
        assert!(store.find_session("s1").await.unwrap().is_none());
        assert!(store.recent("s1", 10).await.unwrap().is_empty());
        assert!(!store.delete_session("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_sessions_most_recent_first() {
        let store = create_test_store().await;
        store.upsert_session("empty", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.append("old", Role::User, "first").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.append("new", Role::User, "second").await.unwrap();

        let sessions = store.list_sessions().await.unwrap();
        let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "empty"]);
        assert_eq!(sessions[0].message_count, 1);
        assert_eq!(sessions[2].message_count, 0);
        assert!(sessions[2].last_message_at.is_none());
    }

    #[tokio::test]
    async fn test_last_message_at() {
        let store = create_test_store().await;
        assert!(store.last_message_at().await.unwrap().is_none());

        let msg = store.append("s1", Role::User, "hola").await.unwrap();
        assert_eq!(store.last_message_at().await.unwrap(), Some(msg.created_at));
    }

    #[tokio::test]
    async fn test_custom_message_table() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        assert!(HistoryStore::with_message_table(pool.clone(), "bad name; --").is_err());
        assert!(HistoryStore::with_message_table(pool.clone(), "chat_session").is_err());

        let store = HistoryStore::with_message_table(pool, "bi_chat_history").unwrap();
        store.init().await.unwrap();
        store.append("s1", Role::User, "hola").await.unwrap();
        assert_eq!(store.recent("s1", 1).await.unwrap().len(), 1);
        assert_eq!(store.owned_tables(), vec!["chat_session", "bi_chat_history"]);
    }

    #[tokio::test]
    async fn test_append_fails_on_closed_pool() {
        let store = create_test_store().await;
        store.pool().close().await;

        assert!(matches!(
            store.append("s1", Role::User, "hola").await,
            Err(AgentError::Persistence(_))
        ));
    }
}
