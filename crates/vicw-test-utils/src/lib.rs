// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the VICW engine.
//!
//! In-memory backends mirror the SQLite contract, the mock embedder is
//! deterministic, and the mock provider is scripted. Together they let the
//! pressure-control, state-machine, and echo-guard properties run as plain
//! unit tests.

pub mod memory_backends;
pub mod mock_embedder;
pub mod mock_provider;

pub use memory_backends::{MemoryChunkStore, MemoryGraphStore, MemoryVectorIndex};
pub use mock_embedder::MockEmbedder;
pub use mock_provider::MockProvider;
