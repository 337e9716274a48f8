// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible shim: `/v1/models` and `/v1/chat/completions`.
//!
//! Adapts OpenAI-style clients (OpenWebUI and friends) onto the engine.
//! The shim drives the same orchestrated turn as `/chat`; streamed replies
//! are synthetic chunks of the already-complete text.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::error;

use vicw_agent::DEFAULT_SESSION_ID;

use crate::handlers::{error_response, ErrorResponse};
use crate::server::GatewayState;

/// Characters per synthetic stream chunk.
const STREAM_CHUNK_CHARS: usize = 40;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionsRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ShimMessage>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShimMessage {
    pub role: String,
    pub content: String,
}

/// GET /v1/models
pub async fn get_models(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "object": "list",
        "data": [{
            "id": state.model,
            "object": "model",
            "owned_by": "vicw",
        }]
    }))
}

/// POST /v1/chat/completions
///
/// Takes the last user message as the turn input; the engine supplies all
/// history, memory, and state itself.
pub async fn post_chat_completions(
    State(state): State<GatewayState>,
    Json(body): Json<ChatCompletionsRequest>,
) -> Response {
    let Some(user_text) = body
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "no user message in request".into(),
            }),
        )
            .into_response();
    };

    let session = state.registry.get_or_create(DEFAULT_SESSION_ID);
    let outcome = match state
        .orchestrator
        .handle_turn(&session, &user_text, true)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "shim turn failed");
            return error_response(&err);
        }
    };

    let model = body.model.unwrap_or_else(|| state.model.clone());
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());
    let created = chrono::Utc::now().timestamp();

    if body.stream {
        return stream_completion(id, model, created, outcome.response).into_response();
    }

    Json(serde_json::json!({
        "id": id,
        "object": "chat.completion",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": outcome.response},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

/// Synthetic SSE stream: the complete text cut into fixed-size deltas,
/// then a stop chunk and `[DONE]`.
fn stream_completion(
    id: String,
    model: String,
    created: i64,
    text: String,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let chars: Vec<char> = text.chars().collect();
    let mut events: Vec<Result<Event, std::convert::Infallible>> = chars
        .chunks(STREAM_CHUNK_CHARS)
        .map(|chunk| {
            let delta: String = chunk.iter().collect();
            let payload = serde_json::json!({
                "id": id,
                "object": "chat.completion.chunk",
                "created": created,
                "model": model,
                "choices": [{
                    "index": 0,
                    "delta": {"content": delta},
                    "finish_reason": null
                }]
            });
            Ok(Event::default().data(payload.to_string()))
        })
        .collect();

    let stop = serde_json::json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": {},
            "finish_reason": "stop"
        }]
    });
    events.push(Ok(Event::default().data(stop.to_string())));
    events.push(Ok(Event::default().data("[DONE]")));

    Sse::new(stream::iter(events))
}
