// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sessions: per-conversation hot state behind a single mutex.
//!
//! Each session owns its context manager and echo ring; all hot-path
//! mutations acquire the session mutex, which serializes turns within a
//! conversation while different sessions proceed in parallel. Sessions
//! share one offload queue and one set of persistent backends.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use vicw_config::VicwConfig;
use vicw_context::{ContextManager, EchoRing, OffloadQueue, PinnedHeader, PressureThresholds};

/// Hot state guarded by the session mutex.
pub struct SessionState {
    pub context: ContextManager,
    pub echo_ring: EchoRing,
}

/// One conversation.
pub struct Session {
    pub id: String,
    pub state: Mutex<SessionState>,
}

impl Session {
    fn new(id: String, config: &VicwConfig, queue: Arc<OffloadQueue>) -> Self {
        let thresholds = PressureThresholds::from_fractions(
            config.context.max_tokens,
            config.context.offload_trigger,
            config.context.offload_target,
            config.context.resume_threshold,
        );
        let header = PinnedHeader::new(config.agent.pinned_header.clone());
        let context = ContextManager::new(header, thresholds, queue);
        let echo_ring = EchoRing::new(config.echo.history_size);
        Self {
            id,
            state: Mutex::new(SessionState { context, echo_ring }),
        }
    }
}

/// Process-wide map of live sessions.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    config: VicwConfig,
    queue: Arc<OffloadQueue>,
}

/// Session id used when a client does not supply one.
pub const DEFAULT_SESSION_ID: &str = "default";

impl SessionRegistry {
    pub fn new(config: VicwConfig, queue: Arc<OffloadQueue>) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            queue,
        }
    }

    /// Fetches an existing session or creates a fresh one.
    pub fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.get(session_id) {
            return Arc::clone(&session);
        }
        let session = Arc::new(Session::new(
            session_id.to_string(),
            &self.config,
            Arc::clone(&self.queue),
        ));
        self.sessions
            .insert(session_id.to_string(), Arc::clone(&session));
        info!(session_id, "session created");
        session
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        let config = VicwConfig::default();
        let queue = Arc::new(OffloadQueue::new(config.queue.max_size));
        SessionRegistry::new(config, queue)
    }

    #[tokio::test]
    async fn get_or_create_reuses_sessions() {
        let registry = registry();
        let a = registry.get_or_create("alpha");
        let b = registry.get_or_create("alpha");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn distinct_ids_get_distinct_sessions() {
        let registry = registry();
        let a = registry.get_or_create("alpha");
        let b = registry.get_or_create("beta");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn session_state_starts_empty() {
        let registry = registry();
        let session = registry.get_or_create(DEFAULT_SESSION_ID);
        let state = session.state.lock().await;
        assert_eq!(state.context.message_count(), 0);
        assert!(state.echo_ring.is_empty());
    }
}
