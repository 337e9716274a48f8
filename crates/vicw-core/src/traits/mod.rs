// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits decoupling the engine from its backends.
//!
//! The engine talks to exactly five seams: the chunk store, the vector
//! index, the graph store, the embedder, and the completion provider. Each
//! has an in-memory fake in `vicw-test-utils`, which is what makes the
//! pressure-control and state-machine properties testable without live
//! services.

pub mod chunk_store;
pub mod embedding;
pub mod graph;
pub mod provider;
pub mod vector_index;

pub use chunk_store::ChunkStore;
pub use embedding::EmbeddingAdapter;
pub use graph::GraphStore;
pub use provider::ProviderAdapter;
pub use vector_index::VectorIndex;
