// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot-path context engine for VICW.
//!
//! Everything on the user-visible latency path lives here: token
//! accounting, the pinned header, pressure relief with hysteresis, the
//! bounded offload queue handing work to the cold path, and the echo ring
//! used for duplicate-response detection.

pub mod echo;
pub mod header;
pub mod manager;
pub mod queue;
pub mod tokenizer;

pub use echo::EchoRing;
pub use header::PinnedHeader;
pub use manager::{ContextManager, ContextStats, PressureThresholds};
pub use queue::{OffloadQueue, QueueStats};
pub use tokenizer::Tokenizer;
