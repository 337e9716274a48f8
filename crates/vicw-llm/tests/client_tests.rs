// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP-behavior tests for the completion client against a mock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vicw_config::model::LlmConfig;
use vicw_core::{CompletionRequest, Message, ProviderAdapter, Role};
use vicw_llm::OpenAiClient;

fn config() -> LlmConfig {
    LlmConfig {
        api_key: Some("sk-test".into()),
        timeout_secs: 5,
        max_retries: 2,
        ..LlmConfig::default()
    }
}

fn client_for(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new(&config())
        .unwrap()
        .with_api_url(format!("{}/v1/chat/completions", server.uri()))
}

fn request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![Message::new(Role::User, "hello", 2)],
        max_tokens: 100,
        temperature: 0.3,
    }
}

fn completion_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "cmpl-1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn successful_completion_returns_text_and_latency() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hi there")))
        .mount(&server)
        .await;

    let response = client_for(&server).complete(request()).await.unwrap();
    assert_eq!(response.text, "hi there");
}

#[tokio::test]
async fn server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
        .mount(&server)
        .await;

    let response = client_for(&server).complete(request()).await.unwrap();
    assert_eq!(response.text, "recovered");
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {"message": "bad request body", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).complete(request()).await.unwrap_err();
    assert!(err.to_string().contains("bad request body"));
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3) // initial + 2 retries
        .mount(&server)
        .await;

    let err = client_for(&server).complete(request()).await.unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn empty_choices_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"id": "cmpl-1", "choices": []})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).complete(request()).await.unwrap_err();
    assert!(err.to_string().contains("no choices"));
}

#[test]
fn missing_api_key_is_a_config_error() {
    // No key in config; the env var is absent in the test environment.
    let mut config = config();
    config.api_key = None;
    if std::env::var("VICW_LLM_API_KEY").is_err() {
        assert!(OpenAiClient::new(&config).is_err());
    }
}
