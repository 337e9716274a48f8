// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface for VICW.
//!
//! The native API (`/chat`, `/health`, `/stats`, `/reset`, `/ingest`,
//! `/metrics`) plus an OpenAI-compatible shim for existing chat clients.

pub mod handlers;
pub mod openai;
pub mod server;

pub use server::{build_router, start_server, GatewayState};
