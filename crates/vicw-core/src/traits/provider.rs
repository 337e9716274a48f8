// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM completion endpoints.

use async_trait::async_trait;

use crate::error::VicwError;
use crate::types::{CompletionRequest, CompletionResponse};

/// Adapter for an external completion endpoint.
///
/// Transport concerns (timeout, retry, backoff) live inside the
/// implementation; callers see either a completed generation or a
/// `VicwError::Provider` / `VicwError::Timeout`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The model identifier requests are issued against.
    fn model(&self) -> &str;

    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, VicwError>;
}
