// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the API surface.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use vicw_agent::{ColdPathWorker, Orchestrator, SessionRegistry};
use vicw_context::OffloadQueue;
use vicw_core::VicwError;

use crate::handlers;
use crate::openai;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<SessionRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub queue: Arc<OffloadQueue>,
    pub worker: Arc<ColdPathWorker>,
    /// Model identifier reported by /health and the OpenAI shim.
    pub model: String,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Builds the router with every API route mounted.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/chat", post(handlers::post_chat))
        .route("/health", get(handlers::get_health))
        .route("/stats", get(handlers::get_stats))
        .route("/reset", post(handlers::post_reset))
        .route("/ingest", post(handlers::post_ingest))
        .route("/metrics", get(handlers::get_metrics))
        .route("/v1/models", get(openai::get_models))
        .route("/v1/chat/completions", post(openai::post_chat_completions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves the gateway until the process exits.
pub async fn start_server(host: &str, port: u16, state: GatewayState) -> Result<(), VicwError> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VicwError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| VicwError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
