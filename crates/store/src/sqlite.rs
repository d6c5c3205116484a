//! SQLite store.
//!
//! Uses a single SQLite database file with two tables:
//! - `channels`: one row per channel, upserted on every sighting
//! - `messages`: append-only log of every recorded message

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::StoreError;
use parley_core::store::{ChannelRecord, ChatStore, StoredMessage};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed chat store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite store at `path`.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let in_memory = path == ":memory:";
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to ":memory:" is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                id          TEXT PRIMARY KEY NOT NULL,
                name        TEXT NOT NULL,
                platform    TEXT NOT NULL,
                self_id     TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("channels table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id  TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                user_name   TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel_id, iid)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        Ok(())
    }

    fn row_to_channel(row: &sqlx::sqlite::SqliteRow) -> Result<ChannelRecord, StoreError> {
        let get = |col: &str| -> Result<String, StoreError> {
            row.try_get(col)
                .map_err(|e| StoreError::QueryFailed(format!("Column {col}: {e}")))
        };
        Ok(ChannelRecord {
            id: get("id")?,
            name: get("name")?,
            platform: get("platform")?,
            self_id: get("self_id")?,
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StoreError> {
        let get = |col: &str| -> Result<String, StoreError> {
            row.try_get(col)
                .map_err(|e| StoreError::QueryFailed(format!("Column {col}: {e}")))
        };
        let created_at = DateTime::parse_from_rfc3339(&get("created_at")?)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("created_at: {e}")))?;
        Ok(StoredMessage {
            channel_id: get("channel_id")?,
            user_id: get("user_id")?,
            user_name: get("user_name")?,
            content: get("content")?,
            created_at,
        })
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record_channel(
        &self,
        id: &str,
        name: &str,
        platform: &str,
        self_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO channels (id, name, platform, self_id, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                platform = excluded.platform,
                self_id = excluded.self_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(platform)
        .bind(self_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT channel failed: {e}")))?;

        debug!(channel_id = %id, "Recorded channel");
        Ok(())
    }

    async fn record_message(
        &self,
        channel_id: &str,
        user_id: &str,
        user_name: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (channel_id, user_id, user_name, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(channel_id)
        .bind(user_id)
        .bind(user_name)
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;

        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelRecord>, StoreError> {
        let rows = sqlx::query("SELECT id, name, platform, self_id FROM channels ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("List channels: {e}")))?;

        rows.iter().map(Self::row_to_channel).collect()
    }

    async fn get_channel(&self, id: &str) -> Result<Option<ChannelRecord>, StoreError> {
        let row = sqlx::query("SELECT id, name, platform, self_id FROM channels WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get channel: {e}")))?;

        row.as_ref().map(Self::row_to_channel).transpose()
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT channel_id, user_id, user_name, content, created_at FROM (
                SELECT * FROM messages WHERE channel_id = ?1 ORDER BY iid DESC LIMIT ?2
            ) ORDER BY iid ASC
            "#,
        )
        .bind(channel_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Recent messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn record_and_get_channel() {
        let db = test_store().await;
        db.record_channel("c1", "general", "discord", "bot").await.unwrap();

        let channel = db.get_channel("c1").await.unwrap().unwrap();
        assert_eq!(channel.platform, "discord");
        assert_eq!(channel.self_id, "bot");
        assert!(db.get_channel("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_on_conflict() {
        let db = test_store().await;
        db.record_channel("c1", "v1", "qq", "bot").await.unwrap();
        db.record_channel("c1", "v2", "qq", "bot").await.unwrap();

        let channels = db.list_channels().await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "v2");
    }

    #[tokio::test]
    async fn recent_messages_returns_tail_in_order() {
        let db = test_store().await;
        for i in 0..4 {
            db.record_message("c1", "u1", "alice", &format!("m{i}"))
                .await
                .unwrap();
        }
        db.record_message("c2", "u2", "bob", "elsewhere").await.unwrap();

        let recent = db.recent_messages("c1", 3).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m1", "m2", "m3"]);
        assert_eq!(recent[0].user_name, "alice");
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.db");
        let path = path.to_string_lossy().to_string();

        {
            let db = SqliteStore::new(&path).await.unwrap();
            db.record_channel("c1", "general", "discord", "bot").await.unwrap();
        }

        let db = SqliteStore::new(&path).await.unwrap();
        assert_eq!(db.list_channels().await.unwrap().len(), 1);
    }
}
