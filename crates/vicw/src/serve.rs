// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vicw serve` command implementation.
//!
//! Wires the full engine: SQLite backends, the ONNX embedder, the
//! completion client, the cold-path worker, the orchestrator, and the
//! gateway. The worker task and the HTTP server share one offload queue
//! and one pause latch.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use vicw_agent::{ColdPathWorker, Orchestrator, PauseLatch, SessionRegistry};
use vicw_config::VicwConfig;
use vicw_context::OffloadQueue;
use vicw_core::{ProviderAdapter, VicwError};
use vicw_gateway::{start_server, GatewayState};
use vicw_llm::OpenAiClient;
use vicw_memory::{HybridRetriever, OnnxEmbedder, SemanticManager, StateTracker};
use vicw_storage::{Database, SqliteChunkStore, SqliteGraphStore, SqliteVectorIndex};

/// Runs the `vicw serve` command until the process exits.
pub async fn run_serve(config: VicwConfig) -> Result<(), VicwError> {
    init_tracing(&config.agent.log_level);
    config.validate()?;

    info!("starting vicw serve");

    // Prometheus recorder. Only one can exist per process; a failure here
    // just disables the /metrics endpoint.
    let prometheus_render = match metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
    {
        Ok(handle) => {
            info!("prometheus metrics recorder installed");
            let render: Arc<dyn Fn() -> String + Send + Sync> =
                Arc::new(move || handle.render());
            Some(render)
        }
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable");
            None
        }
    };

    // Storage backends share one serialized SQLite connection.
    let db = Database::open(&config.storage).await?;
    let chunk_store = Arc::new(SqliteChunkStore::new(db.clone()));
    let vector_index = Arc::new(SqliteVectorIndex::new(
        db.clone(),
        config.embedding.dimension,
    ));
    let graph = Arc::new(SqliteGraphStore::new(db));

    info!(model_path = %config.embedding.model_path, dimension = config.embedding.dimension, "loading embedding model");
    let embedder = Arc::new(OnnxEmbedder::new(
        Path::new(&config.embedding.model_path),
        config.embedding.dimension,
    )?);

    let provider = Arc::new(OpenAiClient::new(&config.llm)?);
    info!(model = provider.model(), url = %config.llm.api_url, "completion client ready");

    let queue = Arc::new(OffloadQueue::new(config.queue.max_size));
    let latch = Arc::new(PauseLatch::new());

    let state_tracker = Arc::new(StateTracker::new(graph.clone(), config.state.clone()));
    let semantic = Arc::new(SemanticManager::new(
        chunk_store.clone(),
        vector_index.clone(),
        graph.clone(),
        embedder.clone(),
        state_tracker.clone(),
    ));
    let retriever = Arc::new(HybridRetriever::new(
        chunk_store,
        vector_index,
        graph,
        embedder.clone(),
        config.retrieval.clone(),
    ));

    let worker = Arc::new(ColdPathWorker::new(
        Arc::clone(&queue),
        semantic,
        Arc::clone(&latch),
        config.worker.clone(),
    ));
    let worker_handle = worker.start();

    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        embedder,
        retriever,
        state_tracker,
        latch,
        config.llm.clone(),
        config.echo.clone(),
    ));

    let registry = Arc::new(SessionRegistry::new(config.clone(), Arc::clone(&queue)));

    let state = GatewayState {
        registry,
        orchestrator,
        queue,
        worker: Arc::clone(&worker),
        model: config.llm.model.clone(),
        start_time: std::time::Instant::now(),
        prometheus_render,
    };

    info!(
        max_tokens = config.context.max_tokens,
        "vicw ready"
    );

    let result = start_server(&config.server.host, config.server.port, state).await;

    worker.shutdown();
    worker_handle.abort();
    result
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vicw={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
