// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded FIFO of offload jobs between the hot path and the cold worker.
//!
//! The one rule that matters: `enqueue` never blocks and never suspends.
//! At capacity the incoming job is dropped and a counter bumped; user
//! latency is prioritized over persistence completeness.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, warn};

use vicw_core::OffloadJob;

/// Snapshot of queue counters for `/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub current_size: usize,
    pub max_size: usize,
    pub enqueued_total: u64,
    pub processed_total: u64,
    pub dropped_total: u64,
}

/// Thread-safe bounded queue decoupling shed (enqueue) from persistence
/// (drain). Safe under concurrent producers and a single consumer.
pub struct OffloadQueue {
    inner: Mutex<VecDeque<OffloadJob>>,
    max_size: usize,
    enqueued: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
}

impl OffloadQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(max_size.min(64))),
            max_size,
            enqueued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Non-blocking enqueue. Returns `false` when the queue is at capacity
    /// and the job was dropped.
    pub fn enqueue(&self, job: OffloadJob) -> bool {
        let mut queue = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if queue.len() >= self.max_size {
            drop(queue);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("vicw_queue_dropped_total").increment(1);
            warn!(
                chunk_id = %job.chunk_id,
                max_size = self.max_size,
                "offload queue full, dropping job"
            );
            return false;
        }
        debug!(chunk_id = %job.chunk_id, queue_size = queue.len() + 1, "queued offload job");
        queue.push_back(job);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Pops up to `batch_size` jobs in FIFO order.
    pub fn drain_batch(&self, batch_size: usize) -> Vec<OffloadJob> {
        let mut queue = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let take = batch_size.min(queue.len());
        let batch: Vec<OffloadJob> = queue.drain(..take).collect();
        if !batch.is_empty() {
            self.processed.fetch_add(batch.len() as u64, Ordering::Relaxed);
            debug!(batch_len = batch.len(), "drained offload batch");
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            current_size: self.len(),
            max_size: self.max_size,
            enqueued_total: self.enqueued.load(Ordering::Relaxed),
            processed_total: self.processed.load(Ordering::Relaxed),
            dropped_total: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(text: &str) -> OffloadJob {
        OffloadJob::create(text.into(), String::new(), 10, 2, serde_json::json!({}))
    }

    #[test]
    fn enqueue_and_drain_fifo() {
        let queue = OffloadQueue::new(10);
        assert!(queue.enqueue(job("first")));
        assert!(queue.enqueue(job("second")));
        assert!(queue.enqueue(job("third")));

        let batch = queue.drain_batch(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].chunk_text, "first");
        assert_eq!(batch[1].chunk_text, "second");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn full_queue_drops_incoming_job() {
        let queue = OffloadQueue::new(2);
        assert!(queue.enqueue(job("a")));
        assert!(queue.enqueue(job("b")));
        assert!(!queue.enqueue(job("c")), "third enqueue must be dropped");

        assert_eq!(queue.dropped_total(), 1);
        assert_eq!(queue.len(), 2);
        // The survivors are the first two, untouched.
        let batch = queue.drain_batch(10);
        assert_eq!(batch[0].chunk_text, "a");
        assert_eq!(batch[1].chunk_text, "b");
    }

    #[test]
    fn drain_of_empty_queue_is_empty() {
        let queue = OffloadQueue::new(4);
        assert!(queue.drain_batch(3).is_empty());
    }

    #[test]
    fn stats_track_all_counters() {
        let queue = OffloadQueue::new(1);
        queue.enqueue(job("a"));
        queue.enqueue(job("b")); // dropped
        queue.drain_batch(5);

        let stats = queue.stats();
        assert_eq!(stats.enqueued_total, 1);
        assert_eq!(stats.dropped_total, 1);
        assert_eq!(stats.processed_total, 1);
        assert_eq!(stats.current_size, 0);
        assert_eq!(stats.max_size, 1);
    }

    #[test]
    fn concurrent_producers_never_exceed_capacity() {
        use std::sync::Arc;

        let queue = Arc::new(OffloadQueue::new(8));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let q = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                for i in 0..16 {
                    q.enqueue(job(&format!("j{i}")));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(queue.len() <= 8);
        let stats = queue.stats();
        assert_eq!(stats.enqueued_total + stats.dropped_total, 64);
    }
}
