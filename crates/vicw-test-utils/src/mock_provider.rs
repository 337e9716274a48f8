// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted completion provider for tests.
//!
//! Returns queued responses in order (repeating the last one when the
//! script runs out) and records every request it received so tests can
//! assert on the prompts that were actually sent.

use std::sync::Mutex;

use async_trait::async_trait;

use vicw_core::{CompletionRequest, CompletionResponse, ProviderAdapter, VicwError};

/// Mock provider with a scripted response sequence.
pub struct MockProvider {
    responses: Mutex<Vec<String>>,
    cursor: Mutex<usize>,
    requests: Mutex<Vec<CompletionRequest>>,
    failing: Mutex<bool>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_responses(vec!["mock response".to_string()])
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            cursor: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
            failing: Mutex::new(false),
        }
    }

    /// Makes every subsequent call fail with a provider error.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Every request received so far, in order.
    pub fn received_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of completions served.
    pub fn call_count(&self) -> usize {
        *self.cursor.lock().unwrap()
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, VicwError> {
        self.requests.lock().unwrap().push(request);
        if *self.failing.lock().unwrap() {
            return Err(VicwError::Provider {
                message: "mock provider set to fail".into(),
                source: None,
            });
        }
        let responses = self.responses.lock().unwrap();
        let mut cursor = self.cursor.lock().unwrap();
        let index = (*cursor).min(responses.len().saturating_sub(1));
        *cursor += 1;
        Ok(CompletionResponse {
            text: responses
                .get(index)
                .cloned()
                .unwrap_or_else(|| "mock response".to_string()),
            latency_ms: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vicw_core::{Message, Role};

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::new(Role::User, text, 2)],
            max_tokens: 64,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn responses_are_served_in_order_then_repeat() {
        let provider = MockProvider::with_responses(vec!["one".into(), "two".into()]);
        assert_eq!(provider.complete(request("a")).await.unwrap().text, "one");
        assert_eq!(provider.complete(request("b")).await.unwrap().text, "two");
        assert_eq!(provider.complete(request("c")).await.unwrap().text, "two");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let provider = MockProvider::new();
        provider.complete(request("hello")).await.unwrap();
        let requests = provider.received_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].content, "hello");
    }

    #[tokio::test]
    async fn failing_mode_errors() {
        let provider = MockProvider::new();
        provider.set_failing(true);
        assert!(provider.complete(request("x")).await.is_err());
    }
}
