// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the core API.
//!
//! `/chat` drives a full orchestrated turn; everything else is inspection
//! and control. LLM failures surface as 5xx; retrieval and persistence
//! failures never do (the turn degrades instead, per the engine contract).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use vicw_agent::DEFAULT_SESSION_ID;
use vicw_context::{ContextStats, QueueStats};
use vicw_core::{OffloadJob, VicwError};

use crate::server::GatewayState;

/// Request body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_use_rag() -> bool {
    true
}

/// Response body for POST /chat.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub timestamp: String,
    pub tokens_in_context: usize,
    pub rag_items_injected: usize,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub context_initialized: bool,
    pub llm_initialized: bool,
    pub model: String,
    pub uptime_secs: u64,
}

/// Response body for GET /stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub context: ContextStats,
    pub queue: QueueStats,
    pub worker: vicw_agent::WorkerStats,
}

/// Request body for POST /ingest.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub document: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(err: &VicwError) -> Response {
    let status = match err {
        VicwError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        VicwError::Provider { .. } => StatusCode::BAD_GATEWAY,
        VicwError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// POST /chat
///
/// Runs one orchestrated turn for the session.
pub async fn post_chat(
    State(state): State<GatewayState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    if body.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "message must not be empty".into(),
            }),
        )
            .into_response();
    }

    let session_id = body.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID);
    let session = state.registry.get_or_create(session_id);

    match state
        .orchestrator
        .handle_turn(&session, &body.message, body.use_rag)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ChatResponse {
                response: outcome.response,
                timestamp: chrono::Utc::now().to_rfc3339(),
                tokens_in_context: outcome.tokens_in_context,
                rag_items_injected: outcome.rag_items_injected,
            }),
        )
            .into_response(),
        Err(err) => {
            error!(session_id, error = %err, "chat turn failed");
            error_response(&err)
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        context_initialized: true,
        llm_initialized: true,
        model: state.model.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /stats
pub async fn get_stats(State(state): State<GatewayState>) -> Json<StatsResponse> {
    let session = state.registry.get_or_create(DEFAULT_SESSION_ID);
    let context = session.state.lock().await.context.stats();
    Json(StatsResponse {
        context,
        queue: state.queue.stats(),
        worker: state.worker.stats(),
    })
}

/// POST /reset
///
/// Clears the session's live messages; persistent stores are untouched.
pub async fn post_reset(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let session = state.registry.get_or_create(DEFAULT_SESSION_ID);
    session.state.lock().await.context.reset();
    info!("context reset via API");
    Json(serde_json::json!({"status": "success", "message": "context reset"}))
}

/// POST /ingest
///
/// Enqueues a document as a synthetic offload job, skipping the shed path.
pub async fn post_ingest(
    State(state): State<GatewayState>,
    Json(body): Json<IngestRequest>,
) -> Response {
    if body.document.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "document must not be empty".into(),
            }),
        )
            .into_response();
    }

    // chars/4, same ratio the hot path's tokenizer uses.
    let token_count = body.document.chars().count().div_ceil(4).max(1);
    let job = OffloadJob::create(
        body.document,
        String::new(),
        token_count,
        1,
        body.metadata
            .unwrap_or_else(|| serde_json::json!({"source": "ingest"})),
    );
    let chunk_id = job.chunk_id.clone();
    let accepted = state.queue.enqueue(job);

    if accepted {
        (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "queued", "chunk_id": chunk_id})),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "offload queue full".into(),
            }),
        )
            .into_response()
    }
}

/// GET /metrics
///
/// Prometheus text rendering, when a recorder is installed.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (StatusCode::OK, render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_defaults_use_rag_to_true() {
        let req: ChatRequest = serde_json::from_str(r#"{"message": "hello"}"#).unwrap();
        assert!(req.use_rag);
        assert!(req.session_id.is_none());
    }

    #[test]
    fn chat_request_accepts_all_fields() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"message": "hi", "use_rag": false, "session_id": "abc"}"#,
        )
        .unwrap();
        assert!(!req.use_rag);
        assert_eq!(req.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn chat_response_serializes() {
        let resp = ChatResponse {
            response: "hello".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            tokens_in_context: 42,
            rag_items_injected: 2,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"tokens_in_context\":42"));
        assert!(json.contains("\"rag_items_injected\":2"));
    }

    #[test]
    fn provider_errors_map_to_bad_gateway() {
        let err = VicwError::Provider {
            message: "upstream broke".into(),
            source: None,
        };
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn timeouts_map_to_gateway_timeout() {
        let err = VicwError::Timeout {
            duration: std::time::Duration::from_secs(60),
        };
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
