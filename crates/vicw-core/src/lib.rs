// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the VICW context engine.
//!
//! This crate provides the foundational trait definitions, error type, and
//! domain types used throughout the VICW workspace. The engine crates talk
//! to backends exclusively through the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::VicwError;
pub use types::{
    ChunkRecord, CompletionRequest, CompletionResponse, EchoEntry, Message, OffloadEvent,
    OffloadJob, RagResult, Role, SemanticHit, StateCandidate, StateNode, StateStatus,
    StateType, VectorHit, VectorPoint,
};

pub use traits::{ChunkStore, EmbeddingAdapter, GraphStore, ProviderAdapter, VectorIndex};
