// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background worker that drains the offload queue through the semantic
//! manager.
//!
//! Runs as one long-lived task per process. It yields while the pause
//! latch is raised, sleeps between empty polls, and survives per-job
//! failures with a counter bump instead of a crash.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use vicw_config::model::WorkerConfig;
use vicw_context::OffloadQueue;
use vicw_memory::SemanticManager;

use crate::latch::PauseLatch;

/// Snapshot of worker counters for `/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub is_running: bool,
    pub processed_count: u64,
    pub failed_count: u64,
    pub success_rate: f64,
}

/// The cold-path worker handle.
pub struct ColdPathWorker {
    queue: Arc<OffloadQueue>,
    semantic: Arc<SemanticManager>,
    latch: Arc<PauseLatch>,
    config: WorkerConfig,
    running: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl ColdPathWorker {
    pub fn new(
        queue: Arc<OffloadQueue>,
        semantic: Arc<SemanticManager>,
        latch: Arc<PauseLatch>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            semantic,
            latch,
            config,
            running: Arc::new(AtomicBool::new(false)),
            processed: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts the worker loop as a background task.
    pub fn start(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let queue = Arc::clone(&self.queue);
        let semantic = Arc::clone(&self.semantic);
        let latch = Arc::clone(&self.latch);
        let running = Arc::clone(&self.running);
        let processed = Arc::clone(&self.processed);
        let failed = Arc::clone(&self.failed);
        let idle = Duration::from_millis(self.config.idle_poll_ms);
        let batch_size = self.config.batch_size;

        info!(batch_size, idle_ms = idle.as_millis() as u64, "cold path worker started");
        tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                if latch.is_paused() {
                    tokio::time::sleep(idle).await;
                    continue;
                }

                let batch = queue.drain_batch(batch_size);
                if batch.is_empty() {
                    tokio::time::sleep(idle).await;
                    continue;
                }

                debug!(batch_len = batch.len(), "processing offload batch");
                for job in &batch {
                    let outcome = semantic.process_job(job).await;
                    if outcome.success {
                        processed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!("vicw_worker_failed_total").increment(1);
                    }
                }
            }
            info!("cold path worker stopped");
        })
    }

    /// Signals the loop to exit after its current batch.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Processes one batch inline. For tests and manual draining.
    pub async fn process_batch(&self) -> usize {
        let batch = self.queue.drain_batch(self.config.batch_size);
        for job in &batch {
            let outcome = self.semantic.process_job(job).await;
            if outcome.success {
                self.processed.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        batch.len()
    }

    pub fn stats(&self) -> WorkerStats {
        let processed = self.processed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total = processed + failed;
        WorkerStats {
            is_running: self.running.load(Ordering::SeqCst),
            processed_count: processed,
            failed_count: failed,
            success_rate: if total > 0 {
                processed as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vicw_config::model::StateConfig;
    use vicw_core::{ChunkStore, OffloadJob};
    use vicw_memory::StateTracker;
    use vicw_test_utils::{MemoryChunkStore, MemoryGraphStore, MemoryVectorIndex, MockEmbedder};

    struct Fixture {
        worker: ColdPathWorker,
        queue: Arc<OffloadQueue>,
        chunk_store: Arc<MemoryChunkStore>,
        latch: Arc<PauseLatch>,
    }

    fn fixture() -> Fixture {
        let queue = Arc::new(OffloadQueue::new(100));
        let chunk_store = Arc::new(MemoryChunkStore::new());
        let vector_index = Arc::new(MemoryVectorIndex::new(64));
        let graph = Arc::new(MemoryGraphStore::new());
        let embedder = Arc::new(MockEmbedder::new(64));
        let tracker = Arc::new(StateTracker::new(graph.clone(), StateConfig::default()));
        let semantic = Arc::new(SemanticManager::new(
            chunk_store.clone(),
            vector_index,
            graph,
            embedder,
            tracker,
        ));
        let latch = Arc::new(PauseLatch::new());
        let worker = ColdPathWorker::new(
            Arc::clone(&queue),
            semantic,
            Arc::clone(&latch),
            WorkerConfig::default(),
        );
        Fixture {
            worker,
            queue,
            chunk_store,
            latch,
        }
    }

    fn job(text: &str) -> OffloadJob {
        OffloadJob::create(text.into(), String::new(), 10, 2, serde_json::json!({}))
    }

    #[tokio::test]
    async fn process_batch_persists_chunks() {
        let f = fixture();
        f.queue.enqueue(job("user: hello\nassistant: hi"));
        f.queue.enqueue(job("user: more\nassistant: sure"));

        let handled = f.worker.process_batch().await;
        assert_eq!(handled, 2);
        assert_eq!(f.chunk_store.chunk_count().await.unwrap(), 2);

        let stats = f.worker.stats();
        assert_eq!(stats.processed_count, 2);
        assert_eq!(stats.failed_count, 0);
        assert_eq!(stats.success_rate, 1.0);
    }

    #[tokio::test]
    async fn failed_jobs_bump_failed_counter_without_crashing() {
        let f = fixture();
        f.chunk_store.set_failing(true);
        f.queue.enqueue(job("user: hello\nassistant: hi"));

        f.worker.process_batch().await;
        let stats = f.worker.stats();
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.processed_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_drains_queue_and_respects_pause() {
        let f = fixture();
        f.latch.pause();
        f.queue.enqueue(job("user: hello\nassistant: hi"));
        let handle = f.worker.start();

        // Paused: nothing drains.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(f.queue.len(), 1);

        // Resumed: the job is picked up.
        f.latch.resume();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(f.queue.len(), 0);
        assert_eq!(f.worker.stats().processed_count, 1);

        f.worker.shutdown();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.is_finished());
    }
}
