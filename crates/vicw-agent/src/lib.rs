// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn orchestration for VICW.
//!
//! Ties the hot path and cold path together: sessions hold per-conversation
//! state, the orchestrator drives a single turn (admit, retrieve, inject,
//! generate, echo-guard), the pause latch keeps the cold worker off the CPU
//! during generation, and the worker drains the offload queue in the
//! background.

pub mod latch;
pub mod orchestrator;
pub mod session;
pub mod worker;

pub use latch::{PauseGuard, PauseLatch};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use session::{Session, SessionRegistry, SessionState, DEFAULT_SESSION_ID};
pub use worker::{ColdPathWorker, WorkerStats};
