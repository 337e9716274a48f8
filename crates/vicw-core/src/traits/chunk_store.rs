// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunk store trait: durable key-value persistence for offloaded chunks.

use async_trait::async_trait;

use crate::error::VicwError;
use crate::types::ChunkRecord;

/// Durable store for offloaded conversation chunks, keyed by chunk id.
///
/// Writes are idempotent: storing the same chunk id twice overwrites the
/// record identically.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persists a chunk record under its chunk id.
    async fn put_chunk(&self, record: &ChunkRecord) -> Result<(), VicwError>;

    /// Fetches a single chunk by id.
    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRecord>, VicwError>;

    /// Fetches several chunks in one round trip. Missing ids are skipped.
    async fn get_chunks(&self, chunk_ids: &[String]) -> Result<Vec<ChunkRecord>, VicwError>;

    /// The most recently created chunks, newest first.
    async fn recent_chunks(&self, limit: usize) -> Result<Vec<ChunkRecord>, VicwError>;

    /// Total number of stored chunks.
    async fn chunk_count(&self) -> Result<usize, VicwError>;
}
