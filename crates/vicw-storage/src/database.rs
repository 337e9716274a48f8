// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and schema
//! migration.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Backends clone the same `Database`; do NOT open additional
//! connections for writes.

use tokio_rusqlite::Connection;
use tracing::info;

use vicw_config::model::StorageConfig;
use vicw_core::VicwError;

/// Convert tokio-rusqlite errors into the engine error type.
pub(crate) fn storage_err(e: tokio_rusqlite::Error) -> VicwError {
    VicwError::Storage { source: Box::new(e) }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id      TEXT PRIMARY KEY,
    chunk_text    TEXT NOT NULL,
    summary       TEXT NOT NULL,
    metadata      TEXT NOT NULL DEFAULT '{}',
    created_at    TEXT NOT NULL,
    token_count   INTEGER NOT NULL,
    message_count INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS chunks_created_idx ON chunks(created_at);

CREATE TABLE IF NOT EXISTS vector_points (
    chunk_id    TEXT PRIMARY KEY,
    embedding   BLOB NOT NULL,
    created_at  TEXT NOT NULL,
    token_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS graph_chunks (
    chunk_id   TEXT PRIMARY KEY,
    summary    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS graph_entities (
    name        TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS graph_edges (
    from_key   TEXT NOT NULL,
    edge_type  TEXT NOT NULL,
    to_key     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (from_key, edge_type, to_key)
);

CREATE TABLE IF NOT EXISTS states (
    state_id     TEXT PRIMARY KEY,
    state_type   TEXT NOT NULL,
    description  TEXT NOT NULL,
    status       TEXT NOT NULL,
    visit_count  INTEGER NOT NULL DEFAULT 0,
    last_visited TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS states_type_status_idx ON states(state_type, status);
"#;

/// Shared handle to the single SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database and applies pragmas and schema.
    pub async fn open(config: &StorageConfig) -> Result<Self, VicwError> {
        let conn = Connection::open(&config.database_path)
            .await
            .map_err(storage_err)?;

        let wal = config.wal_mode;
        conn.call(move |conn| {
            if wal {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?;

        info!(path = %config.database_path, wal = config.wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// Opens an in-memory database with the schema applied. For tests.
    pub async fn open_in_memory() -> Result<Self, VicwError> {
        let conn = Connection::open_in_memory().await.map_err(storage_err)?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
