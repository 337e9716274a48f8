// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite chunk store: `chunk_id` → full record, with a created-at index
//! for recency queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Row;

use vicw_core::{ChunkRecord, ChunkStore, VicwError};

use crate::database::{storage_err, Database};

/// Durable chunk persistence over the shared SQLite connection.
pub struct SqliteChunkStore {
    db: Database,
}

impl SqliteChunkStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ChunkRecord> {
    let metadata: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(ChunkRecord {
        chunk_id: row.get(0)?,
        chunk_text: row.get(1)?,
        summary: row.get(2)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
        token_count: row.get::<_, i64>(5)? as usize,
        message_count: row.get::<_, i64>(6)? as usize,
    })
}

const SELECT_FIELDS: &str =
    "chunk_id, chunk_text, summary, metadata, created_at, token_count, message_count";

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn put_chunk(&self, record: &ChunkRecord) -> Result<(), VicwError> {
        let chunk_id = record.chunk_id.clone();
        let chunk_text = record.chunk_text.clone();
        let summary = record.summary.clone();
        let metadata = record.metadata.to_string();
        let created_at = record.created_at.to_rfc3339();
        let token_count = record.token_count as i64;
        let message_count = record.message_count as i64;

        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO chunks (chunk_id, chunk_text, summary, metadata, created_at, token_count, message_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(chunk_id) DO UPDATE SET
                         chunk_text = excluded.chunk_text,
                         summary = excluded.summary,
                         metadata = excluded.metadata,
                         created_at = excluded.created_at,
                         token_count = excluded.token_count,
                         message_count = excluded.message_count",
                    rusqlite::params![
                        chunk_id,
                        chunk_text,
                        summary,
                        metadata,
                        created_at,
                        token_count,
                        message_count
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRecord>, VicwError> {
        let chunk_id = chunk_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                use rusqlite::OptionalExtension;
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_FIELDS} FROM chunks WHERE chunk_id = ?1"
                ))?;
                let record = stmt
                    .query_row(rusqlite::params![chunk_id], row_to_record)
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(storage_err)
    }

    async fn get_chunks(&self, chunk_ids: &[String]) -> Result<Vec<ChunkRecord>, VicwError> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = chunk_ids.to_vec();
        self.db
            .connection()
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_FIELDS} FROM chunks WHERE chunk_id IN ({placeholders})"
                ))?;
                let records = stmt
                    .query_map(rusqlite::params_from_iter(ids.iter()), row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(storage_err)
    }

    async fn recent_chunks(&self, limit: usize) -> Result<Vec<ChunkRecord>, VicwError> {
        let limit = limit as i64;
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_FIELDS} FROM chunks ORDER BY created_at DESC LIMIT ?1"
                ))?;
                let records = stmt
                    .query_map(rusqlite::params![limit], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(storage_err)
    }

    async fn chunk_count(&self) -> Result<usize, VicwError> {
        self.db
            .connection()
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, summary: &str) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id.to_string(),
            chunk_text: "user: hello\nassistant: hi".to_string(),
            summary: summary.to_string(),
            metadata: serde_json::json!({"relief_num": 1}),
            created_at: Utc::now(),
            token_count: 12,
            message_count: 2,
        }
    }

    async fn store() -> SqliteChunkStore {
        SqliteChunkStore::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn put_and_get_round_trip() {
        let store = store().await;
        store.put_chunk(&record("chunk_a", "greeting")).await.unwrap();

        let fetched = store.get_chunk("chunk_a").await.unwrap().unwrap();
        assert_eq!(fetched.summary, "greeting");
        assert_eq!(fetched.token_count, 12);
        assert_eq!(fetched.metadata["relief_num"], 1);
    }

    #[tokio::test]
    async fn missing_chunk_is_none() {
        let store = store().await;
        assert!(store.get_chunk("chunk_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let store = store().await;
        let rec = record("chunk_a", "first");
        store.put_chunk(&rec).await.unwrap();
        store.put_chunk(&rec).await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);

        // Overwrite with changed summary updates in place.
        store.put_chunk(&record("chunk_a", "second")).await.unwrap();
        let fetched = store.get_chunk("chunk_a").await.unwrap().unwrap();
        assert_eq!(fetched.summary, "second");
        assert_eq!(store.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_chunks_skips_missing_ids() {
        let store = store().await;
        store.put_chunk(&record("chunk_a", "a")).await.unwrap();
        store.put_chunk(&record("chunk_b", "b")).await.unwrap();

        let fetched = store
            .get_chunks(&[
                "chunk_a".to_string(),
                "chunk_ghost".to_string(),
                "chunk_b".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
    }

    #[tokio::test]
    async fn recent_chunks_are_newest_first() {
        let store = store().await;
        let mut old = record("chunk_old", "old");
        old.created_at = Utc::now() - chrono::Duration::hours(1);
        store.put_chunk(&old).await.unwrap();
        store.put_chunk(&record("chunk_new", "new")).await.unwrap();

        let recent = store.recent_chunks(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].chunk_id, "chunk_new");
    }
}
