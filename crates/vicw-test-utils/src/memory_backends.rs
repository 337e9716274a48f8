// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementations of the three backend traits.
//!
//! Behavior mirrors the SQLite backends (merge semantics, ordering,
//! visit-count resets) so engine tests exercise the same contract without
//! touching disk. Each backend has a failure switch for degradation tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vicw_core::types::cosine_similarity;
use vicw_core::{
    ChunkRecord, ChunkStore, GraphStore, StateNode, StateStatus, StateType, VectorHit,
    VectorIndex, VectorPoint, VicwError,
};

fn unavailable(what: &str) -> VicwError {
    VicwError::Storage {
        source: format!("{what} set to fail").into(),
    }
}

/// In-memory chunk store.
#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: Mutex<HashMap<String, ChunkRecord>>,
    failing: AtomicBool,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), VicwError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("chunk store"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn put_chunk(&self, record: &ChunkRecord) -> Result<(), VicwError> {
        self.check()?;
        self.chunks
            .lock()
            .unwrap()
            .insert(record.chunk_id.clone(), record.clone());
        Ok(())
    }

    async fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRecord>, VicwError> {
        self.check()?;
        Ok(self.chunks.lock().unwrap().get(chunk_id).cloned())
    }

    async fn get_chunks(&self, chunk_ids: &[String]) -> Result<Vec<ChunkRecord>, VicwError> {
        self.check()?;
        let chunks = self.chunks.lock().unwrap();
        Ok(chunk_ids
            .iter()
            .filter_map(|id| chunks.get(id).cloned())
            .collect())
    }

    async fn recent_chunks(&self, limit: usize) -> Result<Vec<ChunkRecord>, VicwError> {
        self.check()?;
        let chunks = self.chunks.lock().unwrap();
        let mut all: Vec<ChunkRecord> = chunks.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn chunk_count(&self) -> Result<usize, VicwError> {
        self.check()?;
        Ok(self.chunks.lock().unwrap().len())
    }
}

/// In-memory vector index with the same pinned-dimension contract as the
/// SQLite index.
pub struct MemoryVectorIndex {
    points: Mutex<HashMap<String, VectorPoint>>,
    dimension: usize,
    failing: AtomicBool,
}

impl MemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            points: Mutex::new(HashMap::new()),
            dimension,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, len: Option<usize>) -> Result<(), VicwError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("vector index"));
        }
        if let Some(len) = len {
            if len != self.dimension {
                return Err(VicwError::Embedding(format!(
                    "vector has {len} dims but the index is pinned to {}",
                    self.dimension
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, point: VectorPoint) -> Result<(), VicwError> {
        self.check(Some(point.vector.len()))?;
        self.points.lock().unwrap().insert(point.id.clone(), point);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<VectorHit>, VicwError> {
        self.check(Some(query.len()))?;
        let points = self.points.lock().unwrap();
        let mut hits: Vec<VectorHit> = points
            .values()
            .map(|p| VectorHit {
                id: p.id.clone(),
                score: cosine_similarity(query, &p.vector),
                created_at: p.created_at,
            })
            .filter(|h| h.score >= min_score)
            .collect();
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
        self.check(None)?;
        Ok(self.points.lock().unwrap().len())
    }
}

#[derive(Default)]
struct GraphData {
    chunks: HashMap<String, (String, DateTime<Utc>)>,
    entities: HashMap<String, String>,
    edges: Vec<(String, String, String)>,
    states: Vec<StateNode>,
}

/// In-memory graph store.
#[derive(Default)]
pub struct MemoryGraphStore {
    data: Mutex<GraphData>,
    failing: AtomicBool,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), VicwError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("graph store"));
        }
        Ok(())
    }

    /// All states regardless of status; test-inspection helper.
    pub fn all_states(&self) -> Vec<StateNode> {
        self.data.lock().unwrap().states.clone()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn merge_chunk_node(
        &self,
        chunk_id: &str,
        summary: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), VicwError> {
        self.check()?;
        self.data
            .lock()
            .unwrap()
            .chunks
            .insert(chunk_id.to_string(), (summary.to_string(), created_at));
        Ok(())
    }

    async fn merge_entity(&self, name: &str, entity_type: &str) -> Result<(), VicwError> {
        self.check()?;
        self.data
            .lock()
            .unwrap()
            .entities
            .insert(name.to_string(), entity_type.to_string());
        Ok(())
    }

    async fn merge_edge(
        &self,
        from_key: &str,
        edge_type: &str,
        to_key: &str,
    ) -> Result<(), VicwError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        let edge = (
            from_key.to_string(),
            edge_type.to_string(),
            to_key.to_string(),
        );
        if !data.edges.contains(&edge) {
            data.edges.push(edge);
        }
        Ok(())
    }

    async fn relational_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, VicwError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower
            .split_whitespace()
            .filter(|w| w.chars().count() >= 4)
            .collect();
        let matches = |key: &str| {
            let key_lower = key.to_lowercase();
            let summary = data
                .chunks
                .get(key)
                .map(|(s, _)| s.to_lowercase())
                .unwrap_or_default();
            terms.iter().any(|t| key_lower.contains(t) || summary.contains(t))
                || (terms.is_empty()
                    && (key_lower.contains(&query_lower) || summary.contains(&query_lower)))
        };

        let mut facts = Vec::new();
        for (from, edge_type, to) in &data.edges {
            if matches(from) || matches(to) {
                let display = |key: &String| {
                    data.chunks
                        .get(key)
                        .map(|(s, _)| s.clone())
                        .unwrap_or_else(|| key.clone())
                };
                let fact = format!("({})-[:{edge_type}]->({})", display(from), display(to));
                if !facts.contains(&fact) {
                    facts.push(fact);
                }
                if facts.len() == limit {
                    break;
                }
            }
        }
        Ok(facts)
    }

    async fn create_state(
        &self,
        state_type: StateType,
        description: &str,
        status: StateStatus,
    ) -> Result<StateNode, VicwError> {
        self.check()?;
        let now = Utc::now();
        let state = StateNode {
            state_id: format!("state_{}", uuid::Uuid::new_v4().simple()),
            state_type,
            description: description.to_string(),
            status,
            visit_count: 0,
            last_visited: None,
            created_at: now,
            updated_at: now,
        };
        self.data.lock().unwrap().states.push(state.clone());
        Ok(state)
    }

    async fn states_by_status(
        &self,
        state_type: StateType,
        status: StateStatus,
        limit: usize,
    ) -> Result<Vec<StateNode>, VicwError> {
        self.check()?;
        let data = self.data.lock().unwrap();
        let mut states: Vec<StateNode> = data
            .states
            .iter()
            .filter(|s| s.state_type == state_type && s.status == status)
            .cloned()
            .collect();
        states.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        states.truncate(limit);
        Ok(states)
    }

    async fn update_state_status(
        &self,
        state_id: &str,
        status: StateStatus,
    ) -> Result<(), VicwError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        if let Some(state) = data.states.iter_mut().find(|s| s.state_id == state_id) {
            state.status = status;
            state.updated_at = Utc::now();
            if status != StateStatus::Active {
                state.visit_count = 0;
                state.last_visited = None;
            }
        }
        Ok(())
    }

    async fn touch_state(&self, state_id: &str) -> Result<(), VicwError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        if let Some(state) = data.states.iter_mut().find(|s| s.state_id == state_id) {
            state.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn increment_state_visits(&self, state_ids: &[String]) -> Result<usize, VicwError> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        let now = Utc::now();
        let mut updated = 0;
        for state in data.states.iter_mut() {
            if state_ids.contains(&state.state_id) {
                state.visit_count += 1;
                state.last_visited = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunk_store_round_trip() {
        let store = MemoryChunkStore::new();
        let record = ChunkRecord {
            chunk_id: "chunk_a".into(),
            chunk_text: "text".into(),
            summary: "summary".into(),
            metadata: serde_json_value(),
            created_at: Utc::now(),
            token_count: 5,
            message_count: 1,
        };
        store.put_chunk(&record).await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);
        assert!(store.get_chunk("chunk_a").await.unwrap().is_some());
    }

    fn serde_json_value() -> serde_json::Value {
        serde_json::json!({})
    }

    #[tokio::test]
    async fn failing_backends_error() {
        let store = MemoryChunkStore::new();
        store.set_failing(true);
        assert!(store.chunk_count().await.is_err());

        let index = MemoryVectorIndex::new(4);
        index.set_failing(true);
        assert!(index.search(&[0.0; 4], 1, 0.0).await.is_err());

        let graph = MemoryGraphStore::new();
        graph.set_failing(true);
        assert!(graph.relational_search("q", 1).await.is_err());
    }

    #[tokio::test]
    async fn vector_index_pins_dimension() {
        let index = MemoryVectorIndex::new(3);
        let err = index
            .upsert(VectorPoint {
                id: "chunk_a".into(),
                vector: vec![1.0, 0.0],
                created_at: Utc::now(),
                token_count: 1,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pinned"));
    }

    #[tokio::test]
    async fn graph_state_reset_matches_sqlite_contract() {
        let graph = MemoryGraphStore::new();
        let state = graph
            .create_state(StateType::Goal, "reach the plant", StateStatus::Active)
            .await
            .unwrap();
        graph
            .increment_state_visits(&[state.state_id.clone()])
            .await
            .unwrap();
        graph
            .update_state_status(&state.state_id, StateStatus::Completed)
            .await
            .unwrap();
        let all = graph.all_states();
        assert_eq!(all[0].visit_count, 0);
        assert_eq!(all[0].status, StateStatus::Completed);
    }
}
