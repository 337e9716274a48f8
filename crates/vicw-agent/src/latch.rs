// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pause latch coordinating the cold worker with LLM generation.
//!
//! The orchestrator raises the latch for the duration of a completion call
//! so the worker's CPU-bound steps never compete with generation. The
//! worker polls the latch each loop iteration, which bounds resume lag by
//! its idle-poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Shared pause flag between the orchestrator and the cold worker.
#[derive(Debug, Default)]
pub struct PauseLatch {
    paused: AtomicBool,
}

impl PauseLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        debug!("cold path paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        debug!("cold path resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// RAII guard: pauses on creation, resumes on drop. Keeps the latch
/// balanced across every early return and error path in a turn.
pub struct PauseGuard {
    latch: Arc<PauseLatch>,
}

impl PauseGuard {
    pub fn hold(latch: Arc<PauseLatch>) -> Self {
        latch.pause();
        Self { latch }
    }
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.latch.resume();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_toggles() {
        let latch = PauseLatch::new();
        assert!(!latch.is_paused());
        latch.pause();
        assert!(latch.is_paused());
        latch.resume();
        assert!(!latch.is_paused());
    }

    #[test]
    fn guard_resumes_on_drop() {
        let latch = Arc::new(PauseLatch::new());
        {
            let _guard = PauseGuard::hold(Arc::clone(&latch));
            assert!(latch.is_paused());
        }
        assert!(!latch.is_paused());
    }

    #[test]
    fn guard_resumes_on_panic_unwind() {
        let latch = Arc::new(PauseLatch::new());
        let inner = Arc::clone(&latch);
        let result = std::panic::catch_unwind(move || {
            let _guard = PauseGuard::hold(inner);
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!latch.is_paused());
    }
}
