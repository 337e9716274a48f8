// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport to the external completion endpoint.
//!
//! VICW is middleware: the model lives elsewhere behind an OpenAI-style
//! chat-completions API. This crate owns that HTTP conversation and nothing
//! else.

pub mod client;
pub mod types;

pub use client::OpenAiClient;
