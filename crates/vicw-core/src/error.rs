// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the VICW context engine.

use thiserror::Error;

/// The primary error type used across all VICW adapter traits and core operations.
#[derive(Debug, Error)]
pub enum VicwError {
    /// Configuration errors (invalid TOML, missing required fields, bad thresholds).
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend storage errors (chunk store, vector index, graph store).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM provider errors (API failure, bad status, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding generation failed or produced the wrong dimension.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VicwError {
    /// True for failures worth retrying (transient transport conditions).
    ///
    /// 4xx provider responses and config errors are permanent; everything
    /// wrapped in `Provider` with a transport source or a timeout is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, VicwError::Timeout { .. })
            || matches!(self, VicwError::Provider { source: Some(_), .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = VicwError::Config("offload_trigger must exceed offload_target".into());
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn timeout_is_transient() {
        let err = VicwError::Timeout {
            duration: std::time::Duration::from_secs(60),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn plain_provider_error_is_permanent() {
        let err = VicwError::Provider {
            message: "API returned 400".into(),
            source: None,
        };
        assert!(!err.is_transient());
    }
}
