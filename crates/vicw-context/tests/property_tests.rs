// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property-based tests for the hot path.
//!
//! Uses proptest to verify the pressure-control and queue invariants that
//! must hold for ALL input sequences, not just hand-picked examples.

use std::sync::Arc;

use proptest::prelude::*;

use vicw_context::{ContextManager, EchoRing, OffloadQueue, PinnedHeader, PressureThresholds};
use vicw_core::Role;

fn new_manager(max_tokens: usize, queue: Arc<OffloadQueue>) -> ContextManager {
    let thresholds = PressureThresholds::from_fractions(max_tokens, 0.80, 0.60, 0.70);
    ContextManager::new(PinnedHeader::default(), thresholds, queue)
}

/// Generate message contents whose individual size fits inside the
/// shed headroom (a message larger than `max - target` can legally
/// overshoot, which is the documented exception).
fn arb_contents(max_tokens: usize) -> impl Strategy<Value = Vec<String>> {
    let max_chars = (max_tokens as f64 * 0.3 * 4.0) as usize;
    prop::collection::vec(
        prop::collection::vec(any::<char>(), 1..max_chars.max(2))
            .prop_map(|chars| chars.into_iter().collect::<String>()),
        1..40,
    )
}

proptest! {
    /// After every add_message, total tokens stay within the window bound.
    #[test]
    fn window_bound_holds_for_all_sequences(contents in arb_contents(400)) {
        let queue = Arc::new(OffloadQueue::new(1000));
        let mut manager = new_manager(400, Arc::clone(&queue));
        for (i, content) in contents.iter().enumerate() {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            manager.add_message(role, content.clone());
            prop_assert!(
                manager.current_tokens() <= 400,
                "window exceeded after message {}: {} tokens",
                i,
                manager.current_tokens()
            );
        }
    }

    /// Sheds never produce empty chunks and never reuse a chunk id.
    #[test]
    fn chunks_are_nonempty_and_unique(contents in arb_contents(400)) {
        let queue = Arc::new(OffloadQueue::new(1000));
        let mut manager = new_manager(400, Arc::clone(&queue));
        for (i, content) in contents.iter().enumerate() {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            manager.add_message(role, content.clone());
        }
        let jobs = queue.drain_batch(usize::MAX);
        let mut seen = std::collections::HashSet::new();
        for job in &jobs {
            prop_assert!(job.message_count > 0, "empty chunk produced");
            prop_assert!(!job.chunk_text.is_empty());
            prop_assert!(seen.insert(job.chunk_id.clone()), "duplicate chunk id");
        }
    }

    /// The queue never blocks and never exceeds capacity; drops are counted.
    #[test]
    fn queue_capacity_is_enforced(extra in 0usize..50) {
        let capacity = 5;
        let queue = OffloadQueue::new(capacity);
        let total = capacity + extra;
        for i in 0..total {
            queue.enqueue(vicw_core::OffloadJob::create(
                format!("job {i}"),
                String::new(),
                1,
                1,
                serde_json::json!({}),
            ));
        }
        prop_assert!(queue.len() <= capacity);
        prop_assert_eq!(queue.dropped_total(), extra as u64);
    }

    /// The echo ring never exceeds its capacity regardless of push count.
    #[test]
    fn echo_ring_is_bounded(pushes in 0usize..100, capacity in 1usize..20) {
        let mut ring = EchoRing::new(capacity);
        for i in 0..pushes {
            ring.push(vec![i as f32, 1.0], &format!("response {i}"));
            prop_assert!(ring.len() <= capacity);
        }
    }
}

/// Hysteresis: from just over the trigger, a shed fires, and once usage has
/// dropped below the resume threshold a later crossing of the trigger fires
/// again.
#[test]
fn hysteresis_allows_retrigger_after_resume_dip() {
    let queue = Arc::new(OffloadQueue::new(100));
    let mut manager = new_manager(100, Arc::clone(&queue));

    // Climb past the trigger: four ~20-token exchanges.
    let mut first_shed = false;
    for _ in 0..4 {
        if manager.add_message(Role::User, "x".repeat(72)).is_some() {
            first_shed = true;
        }
    }
    assert!(first_shed, "first shed should fire at the trigger");
    // The shed landed at or below the resume threshold, so pressure can
    // trigger again on the next climb.
    assert!(manager.current_tokens() <= 70 + 28);

    let mut second_shed = false;
    for _ in 0..4 {
        if manager.add_message(Role::User, "x".repeat(72)).is_some() {
            second_shed = true;
        }
    }
    assert!(second_shed, "second shed should fire after usage dipped below resume");
}
