// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! State reconciliation and prompt injection.
//!
//! The extractor emits candidates; this module merges them into the graph
//! (fuzzy-matched against existing states of the same type) and builds the
//! `[STATE MEMORY]` block injected before generation. Injection is what
//! drives visit counting and the boredom warning.

use std::sync::Arc;

use tracing::{debug, info, warn};

use vicw_config::model::StateConfig;
use vicw_core::{GraphStore, StateCandidate, StateNode, StateStatus, StateType, VicwError};

use crate::extractor::normalize_description;

/// Fuzzy-match bound: descriptions within this edit distance are one state.
const MAX_EDIT_DISTANCE: usize = 2;

/// Fuzzy-match bound: token-overlap ratio at or above this collapses too.
const MIN_TOKEN_OVERLAP: f64 = 0.85;

/// Maximum existing states fetched per type for fuzzy matching.
const MATCH_SCAN_LIMIT: usize = 100;

/// Merges extracted candidates into the graph and builds state injections.
pub struct StateTracker {
    graph: Arc<dyn GraphStore>,
    config: StateConfig,
}

impl StateTracker {
    pub fn new(graph: Arc<dyn GraphStore>, config: StateConfig) -> Self {
        Self { graph, config }
    }

    /// Upserts every candidate. Individual failures are logged and do not
    /// abort the batch.
    pub async fn apply_candidates(&self, candidates: &[StateCandidate]) {
        if !self.config.enabled {
            return;
        }
        for candidate in candidates {
            if let Err(e) = self.upsert(candidate).await {
                warn!(
                    state_type = %candidate.state_type,
                    description = %candidate.description,
                    error = %e,
                    "state upsert failed"
                );
            }
        }
    }

    /// Upsert rule: fuzzy-match against active states of the same type;
    /// create when no match, transition when the candidate completes or
    /// invalidates an active state, touch when the status already agrees.
    async fn upsert(&self, candidate: &StateCandidate) -> Result<(), VicwError> {
        let normalized = normalize_description(&candidate.description);
        let active = self
            .graph
            .states_by_status(candidate.state_type, StateStatus::Active, MATCH_SCAN_LIMIT)
            .await?;

        let matched = active
            .iter()
            .find(|state| descriptions_match(&state.description, &normalized));

        match matched {
            None => {
                let state = self
                    .graph
                    .create_state(candidate.state_type, &normalized, candidate.status)
                    .await?;
                debug!(
                    state_id = %state.state_id,
                    state_type = %candidate.state_type,
                    status = %candidate.status,
                    description = %normalized,
                    "state created"
                );
            }
            Some(existing) if candidate.status != StateStatus::Active => {
                self.graph
                    .update_state_status(&existing.state_id, candidate.status)
                    .await?;
                info!(
                    state_id = %existing.state_id,
                    description = %existing.description,
                    status = %candidate.status,
                    "state transitioned"
                );
                metrics::counter!("vicw_state_transitions_total").increment(1);
            }
            Some(existing) => {
                // Same status observed again; record the evidence only.
                self.graph.touch_state(&existing.state_id).await?;
            }
        }
        Ok(())
    }

    /// Builds the `[STATE MEMORY]` block for the next prompt, incrementing
    /// visit counts for every injected active state. Returns `None` when
    /// there is nothing to say.
    pub async fn build_state_injection(&self) -> Result<Option<String>, VicwError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let mut sections: Vec<String> = Vec::new();
        let mut injected_active: Vec<StateNode> = Vec::new();

        for state_type in StateType::ALL {
            let limit = self.limit_for(state_type);
            if limit == 0 {
                continue;
            }
            let states = self
                .graph
                .states_by_status(state_type, StateStatus::Active, limit)
                .await?;
            if states.is_empty() {
                continue;
            }
            let line = states
                .iter()
                .map(|s| s.description.clone())
                .collect::<Vec<_>>()
                .join("; ");
            sections.push(format!("{}: {line}", section_label(state_type)));
            injected_active.extend(states);
        }

        // Recently completed reminders, newest first across all types.
        let mut completed: Vec<StateNode> = Vec::new();
        for state_type in StateType::ALL {
            completed.extend(
                self.graph
                    .states_by_status(state_type, StateStatus::Completed, self.config.completed_limit)
                    .await?,
            );
        }
        completed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        completed.truncate(self.config.completed_limit);
        if !completed.is_empty() {
            let line = completed
                .iter()
                .map(|s| s.description.clone())
                .collect::<Vec<_>>()
                .join("; ");
            sections.push(format!("Recently completed: {line}"));
        }

        if sections.is_empty() {
            return Ok(None);
        }

        let ids: Vec<String> = injected_active
            .iter()
            .map(|s| s.state_id.clone())
            .collect();
        if !ids.is_empty() {
            self.graph.increment_state_visits(&ids).await?;
        }

        // The warning reflects the visit that is happening right now, so
        // the threshold compares against the post-increment count.
        let mut warning = None;
        if self.config.boredom_enabled {
            if let Some(bored) = injected_active
                .iter()
                .find(|s| s.visit_count + 1 >= self.config.boredom_threshold)
            {
                warning = Some(format!(
                    "⚠️ LOOP DETECTED: Repeated focus on {}. Consider concluding or exploring alternatives.",
                    bored.description
                ));
                metrics::counter!("vicw_boredom_warnings_total").increment(1);
            }
        }

        let mut block = String::from("[STATE MEMORY]\n");
        block.push_str(&sections.join("\n"));
        if let Some(warning) = warning {
            block.push('\n');
            block.push_str(&warning);
        }
        Ok(Some(block))
    }

    fn limit_for(&self, state_type: StateType) -> usize {
        match state_type {
            StateType::Goal => self.config.limit_goal,
            StateType::Task => self.config.limit_task,
            StateType::Decision => self.config.limit_decision,
            StateType::Fact => self.config.limit_fact,
        }
    }
}

fn section_label(state_type: StateType) -> &'static str {
    match state_type {
        StateType::Goal => "Active goals",
        StateType::Task => "Active tasks",
        StateType::Decision => "Decisions",
        StateType::Fact => "Known facts",
    }
}

/// Two normalized descriptions refer to the same state when they are within
/// a small edit distance or share most of their tokens.
pub fn descriptions_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if strsim::levenshtein(a, b) <= MAX_EDIT_DISTANCE {
        return true;
    }
    token_overlap_ratio(a, b) >= MIN_TOKEN_OVERLAP
}

/// Jaccard-style overlap over the word sets of both descriptions.
fn token_overlap_ratio(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_descriptions_match() {
        assert!(descriptions_match("restore power", "restore power"));
    }

    #[test]
    fn close_typo_matches() {
        assert!(descriptions_match("hydro-plant", "hydro-plnt"));
    }

    #[test]
    fn token_overlap_matches_reordered_words() {
        assert!(descriptions_match(
            "restore power to grid quickly now",
            "restore power to grid quickly"
        ));
    }

    #[test]
    fn unrelated_descriptions_do_not_match() {
        assert!(!descriptions_match("restore power", "bake a cake"));
    }

    #[test]
    fn overlap_ratio_bounds() {
        assert_eq!(token_overlap_ratio("", ""), 0.0);
        assert_eq!(token_overlap_ratio("a b", "a b"), 1.0);
        assert!((token_overlap_ratio("a b c d", "a b c") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn section_labels_are_stable() {
        assert_eq!(section_label(StateType::Goal), "Active goals");
        assert_eq!(section_label(StateType::Fact), "Known facts");
    }
}
