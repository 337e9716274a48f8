// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph store trait: labeled property graph of chunks, entities, and states.

use async_trait::async_trait;

use crate::error::VicwError;
use crate::types::{StateNode, StateStatus, StateType};

/// Labeled property graph over `Chunk`, `Entity`, and `State` nodes.
///
/// All node writes are merge semantics: chunks are keyed by chunk id,
/// entities by name, and repeated writes update rather than duplicate.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Merges a `Chunk` node, setting its summary and creation time.
    async fn merge_chunk_node(
        &self,
        chunk_id: &str,
        summary: &str,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), VicwError>;

    /// Merges an `Entity` node keyed by name.
    async fn merge_entity(&self, name: &str, entity_type: &str) -> Result<(), VicwError>;

    /// Merges a typed edge between two existing nodes (by key).
    async fn merge_edge(
        &self,
        from_key: &str,
        edge_type: &str,
        to_key: &str,
    ) -> Result<(), VicwError>;

    /// Case-insensitive substring search over node names and chunk summaries;
    /// returns formatted `(A)-[:TYPE]->(B)` triples, at most `limit`.
    async fn relational_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, VicwError>;

    /// Creates a state node with the given fields and `visit_count = 0`.
    async fn create_state(
        &self,
        state_type: StateType,
        description: &str,
        status: StateStatus,
    ) -> Result<StateNode, VicwError>;

    /// All states of a type with the given status, most recently updated
    /// first. Used both for fuzzy upsert matching and for injection.
    async fn states_by_status(
        &self,
        state_type: StateType,
        status: StateStatus,
        limit: usize,
    ) -> Result<Vec<StateNode>, VicwError>;

    /// Transitions a state's status. Any transition out of `Active` resets
    /// `visit_count` to 0 and clears `last_visited`.
    async fn update_state_status(
        &self,
        state_id: &str,
        status: StateStatus,
    ) -> Result<(), VicwError>;

    /// Touches `updated_at` on a state (evidence of a re-observation that
    /// did not change status).
    async fn touch_state(&self, state_id: &str) -> Result<(), VicwError>;

    /// Increments `visit_count` and stamps `last_visited` for each id.
    /// Returns the number of states updated.
    async fn increment_state_visits(&self, state_ids: &[String]) -> Result<usize, VicwError>;
}
