// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the VICW context engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

use vicw_core::VicwError;

/// Top-level VICW configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VicwConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Context-window pressure control.
    #[serde(default)]
    pub context: ContextConfig,

    /// Offload queue bounds.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Cold-path worker pacing.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Hybrid retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Embedding model settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// State tracking and boredom detection.
    #[serde(default)]
    pub state: StateConfig,

    /// Echo guard settings.
    #[serde(default)]
    pub echo: EchoConfig,

    /// External completion endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl VicwConfig {
    /// Rejects configurations whose thresholds cannot produce a working
    /// pressure loop.
    pub fn validate(&self) -> Result<(), VicwError> {
        let c = &self.context;
        if !(0.0..=1.0).contains(&c.offload_trigger)
            || !(0.0..=1.0).contains(&c.offload_target)
            || !(0.0..=1.0).contains(&c.resume_threshold)
        {
            return Err(VicwError::Config(
                "context thresholds must be fractions in [0, 1]".into(),
            ));
        }
        if c.offload_target >= c.offload_trigger {
            return Err(VicwError::Config(format!(
                "offload_target ({}) must be below offload_trigger ({})",
                c.offload_target, c.offload_trigger
            )));
        }
        if c.resume_threshold < c.offload_target || c.resume_threshold > c.offload_trigger {
            return Err(VicwError::Config(format!(
                "resume_threshold ({}) must lie between offload_target and offload_trigger",
                c.resume_threshold
            )));
        }
        if c.max_tokens == 0 {
            return Err(VicwError::Config("context.max_tokens must be positive".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(VicwError::Config("embedding.dimension must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.echo.similarity_threshold) {
            return Err(VicwError::Config(
                "echo.similarity_threshold must be a fraction in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Pinned header text concatenated verbatim at the top of every prompt.
    /// Never shed.
    #[serde(default)]
    pub pinned_header: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            pinned_header: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Context-window pressure control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Maximum tokens allowed in the live context window.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Shed fires when usage reaches this fraction of `max_tokens`.
    #[serde(default = "default_offload_trigger")]
    pub offload_trigger: f64,

    /// Shed removes messages until usage drops to this fraction.
    #[serde(default = "default_offload_target")]
    pub offload_target: f64,

    /// After a shed, no new shed fires until usage has dropped below this
    /// fraction.
    #[serde(default = "default_resume_threshold")]
    pub resume_threshold: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            offload_trigger: default_offload_trigger(),
            offload_target: default_offload_target(),
            resume_threshold: default_resume_threshold(),
        }
    }
}

fn default_max_tokens() -> usize {
    4096
}

fn default_offload_trigger() -> f64 {
    0.80
}

fn default_offload_target() -> f64 {
    0.60
}

fn default_resume_threshold() -> f64 {
    0.70
}

/// Offload queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum queued jobs; enqueues at capacity are dropped, never blocked.
    #[serde(default = "default_queue_max_size")]
    pub max_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: default_queue_max_size(),
        }
    }
}

fn default_queue_max_size() -> usize {
    100
}

/// Cold-path worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Jobs drained per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Sleep between empty polls, in milliseconds.
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    3
}

fn default_idle_poll_ms() -> u64 {
    100
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Whether retrieval runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Semantic hits injected per turn.
    #[serde(default = "default_top_k_semantic")]
    pub top_k_semantic: usize,

    /// Relational triples injected per turn.
    #[serde(default = "default_top_k_relational")]
    pub top_k_relational: usize,

    /// Cosine similarity floor for semantic hits.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            top_k_semantic: default_top_k_semantic(),
            top_k_relational: default_top_k_relational(),
            min_score: default_min_score(),
        }
    }
}

fn default_top_k_semantic() -> usize {
    2
}

fn default_top_k_relational() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.4
}

/// Embedding model configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Embedding dimension, pinned at startup. Writes and queries of any
    /// other dimension are refused.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Path to the ONNX model file (`tokenizer.json` expected alongside).
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            model_path: default_model_path(),
        }
    }
}

fn default_dimension() -> usize {
    384
}

fn default_model_path() -> String {
    "models/all-MiniLM-L6-v2/model.onnx".to_string()
}

/// State tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Whether state extraction and injection run at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-type injection caps.
    #[serde(default = "default_limit_goal")]
    pub limit_goal: usize,
    #[serde(default = "default_limit_task")]
    pub limit_task: usize,
    #[serde(default = "default_limit_decision")]
    pub limit_decision: usize,
    #[serde(default = "default_limit_fact")]
    pub limit_fact: usize,

    /// Recently completed reminders injected per turn.
    #[serde(default = "default_completed_limit")]
    pub completed_limit: usize,

    /// Whether repeated-focus warnings are emitted.
    #[serde(default = "default_true")]
    pub boredom_enabled: bool,

    /// Visit count at which an active state triggers the loop warning.
    #[serde(default = "default_boredom_threshold")]
    pub boredom_threshold: u32,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            limit_goal: default_limit_goal(),
            limit_task: default_limit_task(),
            limit_decision: default_limit_decision(),
            limit_fact: default_limit_fact(),
            completed_limit: default_completed_limit(),
            boredom_enabled: default_true(),
            boredom_threshold: default_boredom_threshold(),
        }
    }
}

fn default_limit_goal() -> usize {
    2
}

fn default_limit_task() -> usize {
    3
}

fn default_limit_decision() -> usize {
    2
}

fn default_limit_fact() -> usize {
    3
}

fn default_completed_limit() -> usize {
    3
}

fn default_boredom_threshold() -> u32 {
    5
}

/// Echo guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EchoConfig {
    /// Whether duplicate-response detection runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Assistant responses remembered for comparison.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Cosine similarity at or above which a response counts as an echo.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Total generation attempts before the last response is accepted anyway.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether the final retry strips RAG and state injections down to the
    /// pinned header and the latest user turn.
    #[serde(default = "default_true")]
    pub strip_context_on_final_retry: bool,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            history_size: default_history_size(),
            similarity_threshold: default_similarity_threshold(),
            max_attempts: default_max_attempts(),
            strip_context_on_final_retry: default_true(),
        }
    }
}

fn default_history_size() -> usize {
    10
}

fn default_similarity_threshold() -> f32 {
    0.95
}

fn default_max_attempts() -> u32 {
    3
}

/// External completion endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Full URL of an OpenAI-compatible chat-completions endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token. `None` requires the `VICW_LLM_API_KEY` env var.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on connect errors and 5xx responses.
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,

    /// Maximum tokens generated per completion.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "mistralai/mistral-7b-instruct".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_llm_max_retries() -> u32 {
    2
}

fn default_max_output_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.3
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_true(),
        }
    }
}

fn default_database_path() -> String {
    "vicw.db".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}
