// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector index trait: nearest-neighbor search over chunk-summary embeddings.

use async_trait::async_trait;

use crate::error::VicwError;
use crate::types::{VectorHit, VectorPoint};

/// Approximate-nearest-neighbor index over chunk-summary embeddings.
///
/// Points are keyed by chunk id; upserting an existing id overwrites the
/// point. The index dimension is pinned at construction and writes or
/// queries of any other dimension are refused.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The pinned embedding dimension.
    fn dimension(&self) -> usize;

    /// Inserts or overwrites a point.
    async fn upsert(&self, point: VectorPoint) -> Result<(), VicwError>;

    /// Returns the `top_k` nearest points by cosine similarity, highest
    /// first, excluding hits below `min_score`.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<VectorHit>, VicwError>;

    /// Total number of stored points.
    async fn point_count(&self) -> Result<usize, VicwError>;
}
