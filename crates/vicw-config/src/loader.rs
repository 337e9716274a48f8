// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./vicw.toml` > `~/.config/vicw/vicw.toml` >
//! `/etc/vicw/vicw.toml` with environment variable overrides via `VICW_`
//! prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::VicwConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/vicw/vicw.toml` (system-wide)
/// 3. `~/.config/vicw/vicw.toml` (user XDG config)
/// 4. `./vicw.toml` (local directory)
/// 5. `VICW_*` environment variables
pub fn load_config() -> Result<VicwConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VicwConfig::default()))
        .merge(Toml::file("/etc/vicw/vicw.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("vicw/vicw.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("vicw.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<VicwConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VicwConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VicwConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VicwConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `VICW_CONTEXT_MAX_TOKENS`
/// must map to `context.max_tokens`, not `context.max.tokens`.
fn env_provider() -> Env {
    Env::prefixed("VICW_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: VICW_CONTEXT_MAX_TOKENS -> "context_max_tokens"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("context_", "context.", 1)
            .replacen("queue_", "queue.", 1)
            .replacen("worker_", "worker.", 1)
            .replacen("retrieval_", "retrieval.", 1)
            .replacen("embedding_", "embedding.", 1)
            .replacen("state_", "state.", 1)
            .replacen("echo_", "echo.", 1)
            .replacen("llm_", "llm.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("server_", "server.", 1);
        mapped.into()
    })
}
