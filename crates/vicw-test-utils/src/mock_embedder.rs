// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic bag-of-words embedder for tests.
//!
//! Hashes each token into one of `d` buckets and L2-normalizes the counts.
//! Identical texts embed identically (cosine 1.0), texts sharing words land
//! close, disjoint texts land far apart. That is exactly the geometry the
//! echo guard and retriever tests need, with zero model files.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use vicw_core::{EmbeddingAdapter, VicwError};

/// Hashed bag-of-words embedder.
pub struct MockEmbedder {
    dimension: usize,
    failing: AtomicBool,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `embed` call fail, for degradation tests.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, VicwError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VicwError::Embedding("mock embedder set to fail".into()));
        }
        Ok(self.embed_sync(text))
    }
}
