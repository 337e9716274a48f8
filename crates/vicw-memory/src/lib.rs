// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cold-path semantics for VICW.
//!
//! Everything that turns shed conversation into long-term memory lives
//! here: the extractive summarizer, the ONNX embedder, the per-job
//! persistence pipeline, the rule-based state extractor with its
//! reconciliation tracker, and the hybrid retriever that brings memory
//! back into prompts.

pub mod embedder;
pub mod extractor;
pub mod retriever;
pub mod semantic;
pub mod states;
pub mod summarizer;

pub use embedder::OnnxEmbedder;
pub use extractor::{extract_states, normalize_description, PatternGroup, DEFAULT_CATALOG};
pub use retriever::{format_injection, HybridRetriever};
pub use semantic::{JobOutcome, SemanticManager};
pub use states::StateTracker;
pub use summarizer::Summarizer;
