// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an OpenAI-compatible chat-completions endpoint.
//!
//! Handles request construction, bearer authentication, per-request
//! timeout, and exponential backoff on transient failures. 4xx responses
//! surface immediately; only connect errors and 5xx are retried.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, warn};

use vicw_config::model::LlmConfig;
use vicw_core::{CompletionRequest, CompletionResponse, ProviderAdapter, VicwError};

use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse, WireMessage};

/// Client for the external completion endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_url: String,
    model: String,
    max_retries: u32,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, VicwError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("VICW_LLM_API_KEY").ok())
            .ok_or_else(|| {
                VicwError::Config(
                    "llm.api_key or the VICW_LLM_API_KEY environment variable must be set".into(),
                )
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| VicwError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| VicwError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            timeout,
        })
    }

    /// Overrides the endpoint URL (for testing against a local mock server).
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }

    fn is_transient_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, VicwError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };

        let start = Instant::now();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(1 << (attempt - 1));
                warn!(attempt, backoff_secs = backoff.as_secs(), "retrying completion request");
                tokio::time::sleep(backoff).await;
            }

            let response = match self.client.post(&self.api_url).json(&body).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    return Err(VicwError::Timeout {
                        duration: self.timeout,
                    });
                }
                Err(e) => {
                    // Connect-level failure: transient, retry.
                    last_error = Some(VicwError::Provider {
                        message: format!("HTTP request failed: {e}"),
                        source: Some(Box::new(e)),
                    });
                    continue;
                }
            };

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let parsed: ChatCompletionResponse =
                    response.json().await.map_err(|e| VicwError::Provider {
                        message: format!("malformed completion response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                let text = parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| VicwError::Provider {
                        message: "completion response contained no choices".into(),
                        source: None,
                    })?;
                let latency_ms = start.elapsed().as_millis() as u64;
                debug!(latency_ms, chars = text.len(), "generation complete");
                return Ok(CompletionResponse { text, latency_ms });
            }

            let transient = Self::is_transient_status(status);
            let body_text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body_text) {
                Ok(api_err) => format!(
                    "API error ({}): {}",
                    if api_err.error.type_.is_empty() {
                        status.to_string()
                    } else {
                        api_err.error.type_
                    },
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body_text}"),
            };

            if transient && attempt < self.max_retries {
                warn!(status = %status, "transient error, will retry");
                last_error = Some(VicwError::Provider {
                    message,
                    source: None,
                });
                continue;
            }
            // 4xx, or retries exhausted.
            return Err(VicwError::Provider {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| VicwError::Provider {
            message: "completion request failed with no response".into(),
            source: None,
        }))
    }
}
