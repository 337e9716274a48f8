// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite vector index: embeddings as BLOBs, cosine search by full scan.
//!
//! The corpus here is chunk summaries for one deployment, which stays in
//! the thousands; a linear scan with an early dimension check is simpler
//! than an ANN structure and fast enough by a wide margin.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vicw_core::types::cosine_similarity;
use vicw_core::{VectorHit, VectorIndex, VectorPoint, VicwError};

use crate::database::{storage_err, Database};

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunks_exact(4)")))
        .collect()
}

/// Cosine-similarity index over chunk-summary embeddings.
pub struct SqliteVectorIndex {
    db: Database,
    dimension: usize,
}

impl SqliteVectorIndex {
    pub fn new(db: Database, dimension: usize) -> Self {
        Self { db, dimension }
    }

    fn check_dimension(&self, len: usize) -> Result<(), VicwError> {
        if len != self.dimension {
            return Err(VicwError::Embedding(format!(
                "vector has {len} dims but the index is pinned to {}",
                self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, point: VectorPoint) -> Result<(), VicwError> {
        self.check_dimension(point.vector.len())?;
        let blob = vec_to_blob(&point.vector);
        let id = point.id;
        let created_at = point.created_at.to_rfc3339();
        let token_count = point.token_count as i64;

        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO vector_points (chunk_id, embedding, created_at, token_count)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(chunk_id) DO UPDATE SET
                         embedding = excluded.embedding,
                         created_at = excluded.created_at,
                         token_count = excluded.token_count",
                    rusqlite::params![id, blob, created_at, token_count],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<VectorHit>, VicwError> {
        self.check_dimension(query.len())?;
        let query = query.to_vec();
        let dimension = self.dimension;

        let mut hits = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT chunk_id, embedding, created_at FROM vector_points")?;
                let rows = stmt.query_map([], |row| {
                    let id: String = row.get(0)?;
                    let blob: Vec<u8> = row.get(1)?;
                    let created_at: String = row.get(2)?;
                    Ok((id, blob, created_at))
                })?;

                let mut hits = Vec::new();
                for row in rows {
                    let (id, blob, created_at) = row?;
                    let vector = blob_to_vec(&blob);
                    if vector.len() != dimension {
                        continue;
                    }
                    let score = cosine_similarity(&query, &vector);
                    hits.push(VectorHit {
                        id,
                        score,
                        created_at: DateTime::parse_from_rfc3339(&created_at)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_default(),
                    });
                }
                Ok(hits)
            })
            .await
            .map_err(storage_err)?;

        hits.retain(|hit| hit.score >= min_score);
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn point_count(&self) -> Result<usize, VicwError> {
        self.db
            .connection()
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM vector_points", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(storage_err)
    }
}
