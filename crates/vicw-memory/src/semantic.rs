// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cold-path job processing: summarize, embed, persist, extract state.
//!
//! Each step of a job is attempted even when an earlier one failed; a lost
//! embedding skips only the vector write, a dead graph skips only the graph
//! writes. Every write is idempotent, so reprocessing the same job is safe.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use vicw_core::{
    ChunkRecord, ChunkStore, EmbeddingAdapter, GraphStore, OffloadJob, VectorIndex, VectorPoint,
};

use crate::extractor::{self, DEFAULT_CATALOG};
use crate::states::StateTracker;
use crate::summarizer::Summarizer;

/// Entities kept per chunk; more is graph noise.
const MAX_ENTITIES_PER_CHUNK: usize = 10;

/// Outcome of one processed job.
#[derive(Debug, Clone, Copy)]
pub struct JobOutcome {
    /// False when any step failed (the job still ran to the end).
    pub success: bool,
}

/// Cold path: turns offload jobs into persisted, searchable memory.
pub struct SemanticManager {
    chunk_store: Arc<dyn ChunkStore>,
    vector_index: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingAdapter>,
    summarizer: Summarizer,
    state_tracker: Arc<StateTracker>,
}

impl SemanticManager {
    pub fn new(
        chunk_store: Arc<dyn ChunkStore>,
        vector_index: Arc<dyn VectorIndex>,
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingAdapter>,
        state_tracker: Arc<StateTracker>,
    ) -> Self {
        Self {
            chunk_store,
            vector_index,
            graph,
            embedder,
            summarizer: Summarizer::default(),
            state_tracker,
        }
    }

    /// Processes a single offload job through every persistence step.
    pub async fn process_job(&self, job: &OffloadJob) -> JobOutcome {
        let start = std::time::Instant::now();
        debug!(chunk_id = %job.chunk_id, tokens = job.token_count, "processing offload job");
        let mut success = true;

        // 1. Summarize (deterministic, cheap).
        let summary = self.summarizer.summarize(&job.chunk_text);

        // 2. Embed the summary. On failure the vector write is skipped but
        // everything else still proceeds.
        let embedding = match self.embedder.embed(&summary).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(chunk_id = %job.chunk_id, error = %e, "embedding failed, skipping vector write");
                success = false;
                None
            }
        };

        // 3. Persist the chunk record.
        let record = ChunkRecord {
            chunk_id: job.chunk_id.clone(),
            chunk_text: job.chunk_text.clone(),
            summary: summary.clone(),
            metadata: job.metadata.clone(),
            created_at: job.created_at,
            token_count: job.token_count,
            message_count: job.message_count,
        };
        if let Err(e) = self.chunk_store.put_chunk(&record).await {
            warn!(chunk_id = %job.chunk_id, error = %e, "chunk store write failed");
            success = false;
        }

        // 4. Upsert the vector point.
        if let Some(vector) = embedding {
            let point = VectorPoint {
                id: job.chunk_id.clone(),
                vector,
                created_at: job.created_at,
                token_count: job.token_count,
            };
            if let Err(e) = self.vector_index.upsert(point).await {
                warn!(chunk_id = %job.chunk_id, error = %e, "vector upsert failed");
                success = false;
            }
        }

        // 5. Merge the graph chunk node and opportunistic entities.
        if let Err(e) = self.update_graph(&job.chunk_id, &summary, job.created_at).await {
            warn!(chunk_id = %job.chunk_id, error = %e, "graph update failed");
            success = false;
        }

        // 6. State extraction over the full text.
        let candidates = extractor::extract_states(&job.chunk_text, DEFAULT_CATALOG);
        self.state_tracker.apply_candidates(&candidates).await;

        info!(
            chunk_id = %job.chunk_id,
            success,
            states = candidates.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "offload job complete"
        );
        JobOutcome { success }
    }

    async fn update_graph(
        &self,
        chunk_id: &str,
        summary: &str,
        created_at: chrono::DateTime<Utc>,
    ) -> Result<(), vicw_core::VicwError> {
        self.graph
            .merge_chunk_node(chunk_id, summary, created_at)
            .await?;

        let entities = extract_entities(summary);
        for (name, entity_type) in &entities {
            self.graph.merge_entity(name, entity_type).await?;
            self.graph.merge_edge(chunk_id, "MENTIONS", name).await?;
        }
        // Entities mentioned together are related.
        for i in 0..entities.len() {
            for j in (i + 1)..entities.len() {
                self.graph
                    .merge_edge(&entities[i].0, "RELATED_TO", &entities[j].0)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Capitalized-phrase entity extraction.
///
/// Picks runs of 1-4 capitalized words as candidate entities, skipping
/// sentence-starters like "The" or "When", and infers a coarse type from
/// surrounding vocabulary.
pub fn extract_entities(text: &str) -> Vec<(String, String)> {
    const COMMON_STARTERS: &[&str] = &[
        "The", "This", "That", "These", "Those", "When", "Where", "What", "Why", "How", "Who",
    ];

    let text_lower = text.to_lowercase();
    let entity_type = if text_lower.contains("goal") || text_lower.contains("objective") {
        "GOAL"
    } else if text_lower.contains("task") || text_lower.contains("implement") {
        "TASK"
    } else {
        "UNKNOWN"
    };

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut entities: Vec<(String, String)> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut i = 0;
    while i < words.len() {
        let cleaned = words[i].trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        if is_capitalized(cleaned) {
            let mut phrase = vec![cleaned];
            let mut j = i + 1;
            while j < words.len() && phrase.len() < 4 {
                let next = words[j].trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
                if is_capitalized(next) {
                    phrase.push(next);
                    j += 1;
                } else {
                    break;
                }
            }
            // Sentence-starters are not part of a name.
            while !phrase.is_empty() && COMMON_STARTERS.contains(&phrase[0]) {
                phrase.remove(0);
            }
            if !phrase.is_empty() {
                let name = phrase.join(" ");
                if seen.insert(name.clone()) {
                    entities.push((name, entity_type.to_string()));
                    if entities.len() == MAX_ENTITIES_PER_CHUNK {
                        break;
                    }
                }
            }
            i = j;
        } else {
            i += 1;
        }
    }
    entities
}

fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        // Leading uppercase plus at least one lowercase; rejects
        // shouting-case tokens like "ERROR".
        Some(first) if first.is_uppercase() => word.chars().any(|c| c.is_lowercase()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_capitalized_phrases() {
        let entities = extract_entities("Alice met Bob Smith near the Hydro-Plant yesterday.");
        let names: Vec<&str> = entities.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"Alice"));
        assert!(names.contains(&"Bob Smith"));
        assert!(names.contains(&"Hydro-Plant"));
    }

    #[test]
    fn skips_sentence_starters() {
        let entities = extract_entities("The grid failed. When Alice checked it was offline.");
        let names: Vec<&str> = entities.iter().map(|(n, _)| n.as_str()).collect();
        assert!(!names.contains(&"The"));
        assert!(!names.contains(&"When"));
        assert!(names.contains(&"Alice"));
    }

    #[test]
    fn deduplicates_entities() {
        let entities = extract_entities("Alice spoke. Alice left. Alice returned.");
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn caps_entity_count() {
        let text = (b'A'..=b'Z')
            .map(|c| format!("{}name", c as char))
            .collect::<Vec<_>>()
            .join(" and ");
        let entities = extract_entities(&text);
        assert!(entities.len() <= MAX_ENTITIES_PER_CHUNK);
    }

    #[test]
    fn infers_goal_type_from_vocabulary() {
        let entities = extract_entities("Their goal was to reach Hydro-Plant.");
        assert!(entities.iter().any(|(_, t)| t == "GOAL"));
    }

    #[test]
    fn all_caps_words_are_not_entities() {
        let entities = extract_entities("ERROR in module handling for Alice");
        let names: Vec<&str> = entities.iter().map(|(n, _)| n.as_str()).collect();
        assert!(!names.contains(&"ERROR"));
        assert!(names.contains(&"Alice"));
    }
}
