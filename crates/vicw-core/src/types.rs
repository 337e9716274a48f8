// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the VICW engine and its adapter traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role of a message in the context window.
///
/// `State` and `Rag` are synthetic roles inserted by the hot path during
/// prompt assembly; they are ephemeral and never persisted as chunks. When
/// rendered for an OpenAI-compatible endpoint both map to `system`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    State,
    Rag,
}

impl Role {
    /// The wire role sent to the completion endpoint.
    pub fn wire_role(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System | Role::State | Role::Rag => "system",
        }
    }
}

/// A single message in the live context window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
    /// Estimated token cost of this message as counted by the session tokenizer.
    pub token_count: usize,
}

impl Message {
    /// Creates a message stamped now with the given token count.
    pub fn new(role: Role, content: impl Into<String>, token_count: usize) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            token_count,
        }
    }
}

/// Emitted by the context manager when a shed fires.
#[derive(Debug, Clone)]
pub struct OffloadEvent {
    pub chunk_id: String,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub duration: std::time::Duration,
}

/// A unit of work handed from the hot path to the cold path.
///
/// Carries a flattened copy of the removed messages; the live context keeps
/// only a placeholder referencing `chunk_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadJob {
    pub chunk_id: String,
    /// The removed messages rendered as `role: content` lines, oldest first.
    pub chunk_text: String,
    /// Snapshot of the pinned header at shed time.
    pub pinned_header_snapshot: String,
    pub token_count: usize,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    /// Free-form metadata (relief number, ingest source, ...).
    pub metadata: serde_json::Value,
}

impl OffloadJob {
    /// Creates a job with a fresh globally unique chunk id.
    pub fn create(
        chunk_text: String,
        pinned_header_snapshot: String,
        token_count: usize,
        message_count: usize,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            chunk_id: format!("chunk_{}", uuid::Uuid::new_v4().simple()),
            chunk_text,
            pinned_header_snapshot,
            token_count,
            message_count,
            created_at: Utc::now(),
            metadata,
        }
    }
}

/// A persisted chunk record in the chunk store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub chunk_text: String,
    pub summary: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub token_count: usize,
    pub message_count: usize,
}

/// A point stored in the vector index, keyed by chunk id.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub token_count: usize,
}

/// A nearest-neighbor hit returned by the vector index.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

/// Kind of conversational state tracked by the loop-prevention machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    Goal,
    Task,
    Decision,
    Fact,
}

impl StateType {
    /// All variants in injection order.
    pub const ALL: [StateType; 4] = [
        StateType::Goal,
        StateType::Task,
        StateType::Decision,
        StateType::Fact,
    ];
}

/// Lifecycle status of a tracked state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StateStatus {
    Active,
    Completed,
    Invalid,
}

/// A state node in the graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateNode {
    pub state_id: String,
    pub state_type: StateType,
    /// Normalized description; unique per `(state_type, description)` up to
    /// fuzzy matching.
    pub description: String,
    pub status: StateStatus,
    /// Times this state was injected into a prompt while active. Resets to 0
    /// on any transition out of `Active`.
    pub visit_count: u32,
    pub last_visited: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate emitted by the state extractor before graph reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCandidate {
    pub state_type: StateType,
    pub status: StateStatus,
    pub description: String,
}

/// One remembered assistant response in the echo ring.
#[derive(Debug, Clone)]
pub struct EchoEntry {
    pub embedding: Vec<f32>,
    pub text_hash: u64,
    pub timestamp: DateTime<Utc>,
}

/// A semantic retrieval hit resolved to its stored summary.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub chunk_id: String,
    pub summary: String,
    pub score: f32,
}

/// Combined result of hybrid retrieval.
#[derive(Debug, Clone, Default)]
pub struct RagResult {
    pub semantic: Vec<SemanticHit>,
    /// Formatted relationship triples, e.g. `(Alice)-[:MENTIONS]->(Hydro-Plant)`.
    pub relational: Vec<String>,
}

impl RagResult {
    pub fn total_items(&self) -> usize {
        self.semantic.len() + self.relational.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}

/// A request sent to the completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A completed generation from the provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub latency_ms: u64,
}

/// Compute cosine similarity between two equal-length vectors.
///
/// For L2-normalized vectors (as produced by sentence-transformer models)
/// this reduces to the dot product; the denominator keeps the result correct
/// for unnormalized test vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display_and_wire_role() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Rag.to_string(), "rag");
        assert_eq!(Role::Rag.wire_role(), "system");
        assert_eq!(Role::State.wire_role(), "system");
        assert_eq!(Role::Assistant.wire_role(), "assistant");
    }

    #[test]
    fn offload_job_ids_are_unique() {
        let a = OffloadJob::create("a".into(), String::new(), 1, 1, serde_json::json!({}));
        let b = OffloadJob::create("a".into(), String::new(), 1, 1, serde_json::json!({}));
        assert_ne!(a.chunk_id, b.chunk_id);
        assert!(a.chunk_id.starts_with("chunk_"));
    }

    #[test]
    fn rag_result_counts() {
        let mut result = RagResult::default();
        assert!(result.is_empty());
        result.semantic.push(SemanticHit {
            chunk_id: "chunk_1".into(),
            summary: "s".into(),
            score: 0.9,
        });
        result.relational.push("(A)-[:MENTIONS]->(B)".into());
        assert_eq!(result.total_items(), 2);
    }

    #[test]
    fn cosine_similarity_identical() {
        let v = vec![0.3_f32, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_zero_vector() {
        let a = vec![0.0_f32, 0.0];
        let b = vec![1.0_f32, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn state_type_round_trips_through_strings() {
        for t in StateType::ALL {
            let s = t.to_string();
            let parsed: StateType = s.parse().unwrap();
            assert_eq!(parsed, t);
        }
    }
}
