//! SQLite memory backend.
//!
//! One database file with two tables:
//! - `memory_events`: the short-term event log
//! - `memory_records`: long-term records keyed by resolved namespace
//!
//! Timestamps are stored as fixed-width RFC 3339 strings so that text
//! ordering matches time ordering.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ferrodesk_core::error::MemoryError;
use ferrodesk_core::memory::{EventMessage, MemoryBackend, MemoryEvent, MemoryRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open the database at `path`, creating it and its tables if needed.
    ///
    /// In-memory URLs get a single connection so every query sees the same database.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let max_connections = if path.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        info!("SQLite memory backend initialized at {path}");
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_events (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id    TEXT UNIQUE NOT NULL,
                actor_id    TEXT NOT NULL,
                session_id  TEXT NOT NULL,
                timestamp   TEXT NOT NULL,
                messages    TEXT NOT NULL,
                metadata    TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("memory_events table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_actor_session \
             ON memory_events(actor_id, session_id, timestamp)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("events index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_records (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                namespace    TEXT NOT NULL,
                content      TEXT NOT NULL,
                score        REAL NOT NULL DEFAULT 0.0,
                strategy_id  TEXT NOT NULL DEFAULT '',
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("memory_records table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_namespace ON memory_records(namespace)")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::MigrationFailed(format!("records index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryEvent, MemoryError> {
        let column = |name: &str, e: sqlx::Error| MemoryError::QueryFailed(format!("{name} column: {e}"));

        let event_id: String = row.try_get("event_id").map_err(|e| column("event_id", e))?;
        let actor_id: String = row.try_get("actor_id").map_err(|e| column("actor_id", e))?;
        let session_id: String = row.try_get("session_id").map_err(|e| column("session_id", e))?;
        let timestamp: String = row.try_get("timestamp").map_err(|e| column("timestamp", e))?;
        let messages_json: String = row.try_get("messages").map_err(|e| column("messages", e))?;
        let metadata_json: String = row.try_get("metadata").map_err(|e| column("metadata", e))?;

        let messages: Vec<EventMessage> = serde_json::from_str(&messages_json)
            .map_err(|e| MemoryError::QueryFailed(format!("event {event_id} messages: {e}")))?;
        let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();

        Ok(MemoryEvent {
            event_id,
            actor_id,
            session_id,
            timestamp: parse_timestamp(&timestamp),
            messages,
            metadata,
        })
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryRecord, MemoryError> {
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let strategy_id: String = row
            .try_get("strategy_id")
            .map_err(|e| MemoryError::QueryFailed(format!("strategy_id column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;
        let score: f64 = row.try_get("score").unwrap_or(0.0);

        Ok(MemoryRecord {
            content,
            score: score as f32,
            strategy_id,
            created_at: parse_timestamp(&created_at),
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl MemoryBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_event(&self, event: MemoryEvent) -> Result<String, MemoryError> {
        let messages = serde_json::to_string(&event.messages)
            .map_err(|e| MemoryError::Storage(format!("Event serialization: {e}")))?;
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| MemoryError::Storage(format!("Metadata serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO memory_events (event_id, actor_id, session_id, timestamp, messages, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.actor_id)
        .bind(&event.session_id)
        .bind(format_timestamp(&event.timestamp))
        .bind(&messages)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT event failed: {e}")))?;

        debug!(event_id = %event.event_id, session_id = %event.session_id, "Stored memory event");
        Ok(event.event_id)
    }

    async fn list_events(
        &self,
        actor_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEvent>, MemoryError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM memory_events
            WHERE actor_id = ?1 AND session_id = ?2
            ORDER BY timestamp DESC, iid DESC
            LIMIT ?3
            "#,
        )
        .bind(actor_id)
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("list events: {e}")))?;

        let mut events = rows
            .iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>, _>>()?;
        events.reverse();
        Ok(events)
    }

    async fn retrieve_records(
        &self,
        namespace: &str,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let rows = sqlx::query(
            r#"
            SELECT content, score, strategy_id, created_at FROM memory_records
            WHERE namespace = ?1
            ORDER BY score DESC, created_at DESC, iid DESC
            LIMIT ?2
            "#,
        )
        .bind(namespace)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("retrieve records: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn put_record(&self, namespace: &str, record: MemoryRecord) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO memory_records (namespace, content, score, strategy_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(namespace)
        .bind(&record.content)
        .bind(record.score as f64)
        .bind(&record.strategy_id)
        .bind(format_timestamp(&record.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT record failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrodesk_core::turn::Turn;

    async fn test_backend(dir: &tempfile::TempDir) -> SqliteBackend {
        let url = format!("sqlite://{}", dir.path().join("memory.db").display());
        SqliteBackend::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn events_round_trip_oldest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let db = test_backend(&tmp).await;
        for text in ["uno", "dos", "tres"] {
            let turn = Turn::new("customer_1", "s1", text, "ok")
                .with_metadata("need_to_escalate", serde_json::json!(false));
            db.create_event(MemoryEvent::from_turn(&turn)).await.unwrap();
        }

        let events = db.list_events("customer_1", "s1", 2).await.unwrap();
        let lines: Vec<_> = events.iter().map(|e| e.messages[0].content.as_str()).collect();
        assert_eq!(lines, vec!["dos", "tres"]);
        assert_eq!(events[0].metadata["need_to_escalate"], false);
    }

    #[tokio::test]
    async fn events_are_scoped_by_actor_and_session() {
        let tmp = tempfile::tempdir().unwrap();
        let db = test_backend(&tmp).await;
        db.create_event(MemoryEvent::from_turn(&Turn::new("customer_1", "s1", "a", "b")))
            .await
            .unwrap();
        assert!(db.list_events("customer_1", "s2", 10).await.unwrap().is_empty());
        assert!(db.list_events("customer_2", "s1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_ranked_by_score() {
        let tmp = tempfile::tempdir().unwrap();
        let db = test_backend(&tmp).await;
        for (content, score) in [("low", 0.2), ("high", 0.8), ("mid", 0.5)] {
            db.put_record("/ns", MemoryRecord::new(content, "sem").with_score(score))
                .await
                .unwrap();
        }
        db.put_record("/other", MemoryRecord::new("elsewhere", "sem")).await.unwrap();

        let found = db.retrieve_records("/ns", "user information", 2).await.unwrap();
        let contents: Vec<_> = found.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["high", "mid"]);
        assert_eq!(found[0].strategy_id, "sem");
    }

    #[tokio::test]
    async fn reopening_keeps_data() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let db = test_backend(&tmp).await;
            db.put_record("/ns", MemoryRecord::new("kept", "p")).await.unwrap();
        }
        let db = test_backend(&tmp).await;
        assert_eq!(db.retrieve_records("/ns", "q", 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn in_memory_url_shares_one_database() {
        let db = SqliteBackend::new("sqlite::memory:").await.unwrap();
        db.put_record("/ns", MemoryRecord::new("x", "p")).await.unwrap();
        assert_eq!(db.retrieve_records("/ns", "q", 5).await.unwrap().len(), 1);
    }
}
