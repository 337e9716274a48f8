// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::VicwError;

/// Adapter producing fixed-dimension dense vectors from text.
///
/// Implementations must be pure: the same text yields the same vector, and
/// every vector has exactly `dimension()` components.
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync {
    /// The fixed output dimension.
    fn dimension(&self) -> usize;

    /// Embeds a single text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VicwError>;
}
