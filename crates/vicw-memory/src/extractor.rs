// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule-based state extraction from conversation text.
//!
//! A pure function over a static pattern catalog: no I/O, no model calls.
//! Each sentence is scanned for completion, invalidation, and creation
//! patterns (in that priority order) per state type, and every hit yields a
//! `(state_type, status, description)` candidate. Reconciliation against
//! the graph happens later in [`crate::states::StateTracker`].

use std::collections::HashSet;

use tracing::debug;

use vicw_core::{StateCandidate, StateStatus, StateType};

use crate::summarizer::split_sentences;

/// Literal patterns for one state type.
#[derive(Debug, Clone, Copy)]
pub struct PatternGroup {
    pub create: &'static [&'static str],
    pub complete: &'static [&'static str],
    pub invalidate: &'static [&'static str],
}

/// The built-in catalog. Patterns are matched case-insensitively as
/// substrings of a sentence; the description is what follows the match.
pub const DEFAULT_CATALOG: &[(StateType, PatternGroup)] = &[
    (
        StateType::Goal,
        PatternGroup {
            create: &[
                "let's go to",
                "let us go to",
                "we need to",
                "we should head to",
                "we want to",
                "our goal is",
                "the goal is",
                "the objective is",
            ],
            complete: &[
                "arrived at",
                "we made it to",
                "we reached",
                "goal achieved",
                "goal accomplished",
            ],
            invalidate: &["abandoned the goal of", "gave up on", "no longer need to"],
        },
    ),
    (
        StateType::Task,
        PatternGroup {
            create: &[
                "i'm working on",
                "i am working on",
                "we're working on",
                "i will",
                "i'll start",
                "let's implement",
                "we need to implement",
                "next step is",
            ],
            complete: &[
                "is completed",
                "is complete",
                "is done",
                "is finished",
                "is merged",
                "has been completed",
                "finished implementing",
            ],
            invalidate: &["is cancelled", "is canceled", "won't be doing", "is blocked on"],
        },
    ),
    (
        StateType::Decision,
        PatternGroup {
            create: &[
                "we decided to use",
                "we decided to",
                "we decided on",
                "we chose",
                "we'll go with",
                "settled on",
                "is chosen",
            ],
            complete: &[],
            invalidate: &["reversed the decision to", "reconsidered"],
        },
    ),
    (
        StateType::Fact,
        PatternGroup {
            create: &[
                "we discovered that",
                "we learned that",
                "we found that",
                "it turns out",
                "we know that",
                "we confirmed that",
            ],
            complete: &[],
            invalidate: &["is no longer true that", "turned out to be wrong"],
        },
    ),
];

/// Description length bounds; hits outside are discarded as noise.
const MIN_DESC_CHARS: usize = 3;
const MAX_DESC_CHARS: usize = 100;

/// Lone words that are never useful descriptions.
const SKIP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "we", "i", "you",
];

/// Extracts state candidates from text against the catalog.
///
/// Completion and invalidation hits take priority over creation within a
/// sentence, and descriptions are deduplicated across the whole extraction.
pub fn extract_states(text: &str, catalog: &[(StateType, PatternGroup)]) -> Vec<StateCandidate> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for sentence in split_sentences(text) {
        let sentence_lower = sentence.to_lowercase();

        for (state_type, group) in catalog {
            let tiers: [(&[&str], StateStatus); 3] = [
                (group.complete, StateStatus::Completed),
                (group.invalidate, StateStatus::Invalid),
                (group.create, StateStatus::Active),
            ];
            for (patterns, status) in tiers {
                let mut matched = false;
                for pattern in patterns {
                    if let Some(idx) = sentence_lower.find(pattern) {
                        if let Some(description) =
                            extract_description(sentence, &sentence_lower, idx, pattern)
                        {
                            if seen.insert(description.clone()) {
                                candidates.push(StateCandidate {
                                    state_type: *state_type,
                                    status,
                                    description,
                                });
                            }
                            matched = true;
                            break;
                        }
                    }
                }
                if matched {
                    break;
                }
            }
        }
    }

    if !candidates.is_empty() {
        debug!(count = candidates.len(), "extracted state candidates");
    }
    candidates
}

/// Normalizes a description for matching: lowercased, whitespace-collapsed,
/// one leading article or connector stripped.
pub fn normalize_description(description: &str) -> String {
    let collapsed = description.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = collapsed.to_lowercase();
    for prefix in ["to ", "that ", "the ", "a ", "an "] {
        if let Some(stripped) = lower.strip_prefix(prefix) {
            return stripped.to_string();
        }
    }
    lower
}

/// Pulls the description out of a sentence after the matched pattern.
fn extract_description(
    sentence: &str,
    sentence_lower: &str,
    pattern_idx: usize,
    pattern: &str,
) -> Option<String> {
    // pattern_idx is a byte index into the lowercased sentence; lowercasing
    // is length-preserving for ASCII patterns, so it indexes the original
    // too as long as the prefix is ASCII-compatible. Fall back to the
    // lowercase rendering otherwise.
    let after = if sentence.is_char_boundary(pattern_idx + pattern.len()) {
        &sentence[pattern_idx + pattern.len()..]
    } else {
        &sentence_lower[pattern_idx + pattern.len()..]
    };

    // Cut at the first clause-ending punctuation.
    let clause = after
        .split(|c| matches!(c, ',' | ';' | '.' | '!' | '?'))
        .next()
        .unwrap_or("");

    let description = normalize_description(clause);

    let char_count = description.chars().count();
    if !(MIN_DESC_CHARS..=MAX_DESC_CHARS).contains(&char_count) {
        return None;
    }
    if SKIP_WORDS.contains(&description.as_str()) {
        return None;
    }
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Vec<StateCandidate> {
        extract_states(text, DEFAULT_CATALOG)
    }

    #[test]
    fn goal_creation_detected() {
        let states = extract(
            "Alice turned to Bob. 'Let's go to the Hydro-Plant,' she said. \
             'We need to restore power to the grid.'",
        );
        assert!(
            states.iter().any(|s| s.state_type == StateType::Goal
                && s.status == StateStatus::Active
                && s.description.contains("hydro")),
            "goal creation should be detected, got {states:?}"
        );
    }

    #[test]
    fn goal_completion_detected() {
        let states = extract(
            "After walking for an hour, they finally arrived at the Hydro-Plant. \
             The gates stood open.",
        );
        assert!(
            states.iter().any(|s| s.state_type == StateType::Goal
                && s.status == StateStatus::Completed),
            "goal completion should be detected, got {states:?}"
        );
    }

    #[test]
    fn task_creation_detected() {
        let states = extract(
            "I'm working on refactoring the authentication module to use JWT tokens \
             instead of sessions.",
        );
        assert!(states
            .iter()
            .any(|s| s.state_type == StateType::Task && s.status == StateStatus::Active));
    }

    #[test]
    fn task_completion_detected() {
        let states = extract("Great! The auth module refactoring is completed and merged into main.");
        assert!(states
            .iter()
            .any(|s| s.state_type == StateType::Task && s.status == StateStatus::Completed));
    }

    #[test]
    fn decision_detected() {
        let states = extract("After evaluating the options, we decided to use PostgreSQL for the database.");
        assert!(states.iter().any(|s| s.state_type == StateType::Decision
            && s.description.contains("postgresql")));
    }

    #[test]
    fn fact_detected() {
        let states = extract(
            "We discovered that the power grid is offline and the backup generators \
             are not functioning.",
        );
        assert!(states.iter().any(|s| s.state_type == StateType::Fact));
    }

    #[test]
    fn repeated_phrasing_deduplicates() {
        let states = extract("Let's go to the plant. We need to go to the plant.");
        let goals = states
            .iter()
            .filter(|s| s.state_type == StateType::Goal)
            .count();
        assert!(goals <= 2, "near-identical goals should collapse, got {states:?}");
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(extract("").is_empty());
    }

    #[test]
    fn too_short_description_is_dropped() {
        let states = extract("We need to go.");
        assert!(
            states.iter().all(|s| s.description.chars().count() >= 3),
            "descriptions under three chars must be dropped"
        );
    }

    #[test]
    fn completion_outranks_creation_in_one_sentence() {
        // Both "we need to" (create) and "is done" (complete) occur; the
        // completion tier wins for the task type.
        let states = extract("We need to admit the migration is done now.");
        let task = states
            .iter()
            .find(|s| s.state_type == StateType::Task)
            .expect("task candidate expected");
        assert_eq!(task.status, StateStatus::Completed);
    }

    #[test]
    fn normalize_strips_articles_and_case() {
        assert_eq!(normalize_description("The  Hydro-Plant"), "hydro-plant");
        assert_eq!(normalize_description("to restore power"), "restore power");
        assert_eq!(normalize_description("Restore Power"), "restore power");
    }
}
