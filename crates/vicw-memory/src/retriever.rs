// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retriever combining vector similarity and graph pattern matching.
//!
//! The retriever embeds the query, runs the vector index and the graph's
//! relational search, resolves semantic hits to their stored summaries, and
//! formats a single injection block. Every backend failure degrades to
//! fewer results; retrieval never fails a turn.

use std::sync::Arc;

use tracing::{debug, warn};

use vicw_config::model::RetrievalConfig;
use vicw_core::{
    ChunkStore, EmbeddingAdapter, GraphStore, RagResult, SemanticHit, VectorIndex,
};

/// Hybrid semantic + relational retrieval over the three backends.
pub struct HybridRetriever {
    chunk_store: Arc<dyn ChunkStore>,
    vector_index: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingAdapter>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        chunk_store: Arc<dyn ChunkStore>,
        vector_index: Arc<dyn VectorIndex>,
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingAdapter>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            chunk_store,
            vector_index,
            graph,
            embedder,
            config,
        }
    }

    /// Retrieves memories relevant to a query.
    ///
    /// Semantic hits are ranked by index score with more recent chunks first
    /// on ties; relational triples follow in insertion order. Partial
    /// failures shrink the result instead of propagating.
    pub async fn retrieve(&self, query: &str) -> RagResult {
        if !self.config.enabled {
            return RagResult::default();
        }
        let start = std::time::Instant::now();

        let semantic = match self.semantic_search(query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "semantic retrieval failed, continuing without it");
                Vec::new()
            }
        };

        let relational = match self
            .graph
            .relational_search(query, self.config.top_k_relational)
            .await
        {
            Ok(facts) => facts,
            Err(e) => {
                warn!(error = %e, "relational retrieval failed, continuing without it");
                Vec::new()
            }
        };

        let result = RagResult {
            semantic,
            relational,
        };
        debug!(
            semantic = result.semantic.len(),
            relational = result.relational.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "hybrid retrieval complete"
        );
        metrics::counter!("vicw_rag_items_total").increment(result.total_items() as u64);
        result
    }

    async fn semantic_search(&self, query: &str) -> Result<Vec<SemanticHit>, vicw_core::VicwError> {
        let query_vector = self.embedder.embed(query).await?;
        let mut hits = self
            .vector_index
            .search(&query_vector, self.config.top_k_semantic, self.config.min_score)
            .await?;

        // Score descending; ties broken by more recent chunks.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let chunks = self.chunk_store.get_chunks(&ids).await?;

        let resolved = hits
            .into_iter()
            .filter_map(|hit| {
                chunks
                    .iter()
                    .find(|c| c.chunk_id == hit.id)
                    .map(|c| SemanticHit {
                        chunk_id: hit.id,
                        summary: c.summary.clone(),
                        score: hit.score,
                    })
            })
            .collect();
        Ok(resolved)
    }
}

/// Formats a retrieval result as the injection block, or `None` when there
/// is nothing to inject.
pub fn format_injection(result: &RagResult) -> Option<String> {
    if result.is_empty() {
        return None;
    }
    let mut lines = vec!["[CONTEXT FROM MEMORY]".to_string()];
    for hit in &result.semantic {
        lines.push(format!("- {}", hit.summary));
    }
    for fact in &result.relational {
        lines.push(format!("- {fact}"));
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_injects_nothing() {
        assert!(format_injection(&RagResult::default()).is_none());
    }

    #[test]
    fn injection_lists_semantic_before_relational() {
        let result = RagResult {
            semantic: vec![SemanticHit {
                chunk_id: "chunk_1".into(),
                summary: "they reached the plant".into(),
                score: 0.8,
            }],
            relational: vec!["(Alice)-[:MENTIONS]->(Hydro-Plant)".into()],
        };
        let block = format_injection(&result).unwrap();
        assert!(block.starts_with("[CONTEXT FROM MEMORY]"));
        let summary_at = block.find("they reached the plant").unwrap();
        let fact_at = block.find("(Alice)-[:MENTIONS]").unwrap();
        assert!(summary_at < fact_at);
    }
}
