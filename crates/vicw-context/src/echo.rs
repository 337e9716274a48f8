// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-size ring of recent assistant responses for echo detection.
//!
//! The ring holds the last `H` response embeddings. A candidate response
//! whose maximum cosine similarity against the ring reaches the configured
//! threshold is an echo and triggers regeneration (driven by the
//! orchestrator).

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use chrono::Utc;

use vicw_core::types::cosine_similarity;
use vicw_core::EchoEntry;

/// Bounded FIFO of response embeddings. Eviction is an O(1) pop of the
/// oldest entry.
#[derive(Debug)]
pub struct EchoRing {
    entries: VecDeque<EchoEntry>,
    capacity: usize,
}

impl EchoRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remembers a response, evicting the oldest entry when full.
    pub fn push(&mut self, embedding: Vec<f32>, text: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(EchoEntry {
            embedding,
            text_hash: hash_text(text),
            timestamp: Utc::now(),
        });
    }

    /// Highest cosine similarity between the candidate and any remembered
    /// response; 0.0 against an empty ring.
    pub fn max_similarity(&self, candidate: &[f32]) -> f32 {
        self.entries
            .iter()
            .filter(|e| e.embedding.len() == candidate.len())
            .map(|e| cosine_similarity(&e.embedding, candidate))
            .fold(0.0_f32, f32::max)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_similarity_is_zero() {
        let ring = EchoRing::new(10);
        assert_eq!(ring.max_similarity(&[0.5, 0.5]), 0.0);
    }

    #[test]
    fn identical_embedding_scores_one() {
        let mut ring = EchoRing::new(10);
        let v = vec![0.6, 0.8];
        ring.push(v.clone(), "a response");
        assert!((ring.max_similarity(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn different_embeddings_score_low() {
        let mut ring = EchoRing::new(10);
        ring.push(vec![1.0, 0.0], "a response");
        assert!(ring.max_similarity(&[0.0, 1.0]) < 0.1);
    }

    #[test]
    fn ring_never_exceeds_capacity_and_evicts_fifo() {
        let mut ring = EchoRing::new(3);
        for i in 0..5 {
            // Orthogonal unit basis vectors so similarities are exact.
            let mut v = vec![0.0_f32; 5];
            v[i] = 1.0;
            ring.push(v, &format!("response {i}"));
            assert!(ring.len() <= 3);
        }
        assert_eq!(ring.len(), 3);
        // Entries 0 and 1 were evicted; 2..5 remain.
        let mut oldest = vec![0.0_f32; 5];
        oldest[0] = 1.0;
        assert_eq!(ring.max_similarity(&oldest), 0.0);
        let mut newest = vec![0.0_f32; 5];
        newest[4] = 1.0;
        assert!((ring.max_similarity(&newest) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_are_ignored() {
        let mut ring = EchoRing::new(4);
        ring.push(vec![1.0, 0.0, 0.0], "three dims");
        assert_eq!(ring.max_similarity(&[1.0, 0.0]), 0.0);
    }

    #[test]
    fn zero_capacity_ring_stays_empty() {
        let mut ring = EchoRing::new(0);
        ring.push(vec![1.0], "ignored");
        assert!(ring.is_empty());
    }
}
