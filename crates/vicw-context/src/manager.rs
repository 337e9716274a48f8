// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot-path context management with deterministic pressure control.
//!
//! The [`ContextManager`] owns the live message list and the pinned header,
//! tracks token usage, and sheds the oldest messages into an offload job
//! when pressure crosses the trigger threshold. A shed copies messages,
//! computes a chunk id, and enqueues; it performs no I/O, no embedding, and
//! no LLM call.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use vicw_core::{Message, OffloadEvent, OffloadJob, Role};

use crate::header::PinnedHeader;
use crate::queue::OffloadQueue;
use crate::tokenizer::Tokenizer;

/// Fixed token cost charged for an archive placeholder, independent of the
/// rendered id length. Keeps shed arithmetic constant.
const PLACEHOLDER_TOKEN_COST: usize = 8;

const PLACEHOLDER_PREFIX: &str = "[ARCHIVED mem_id:";

/// Pressure thresholds as absolute token counts, precomputed from the
/// configured fractions of `max_tokens`.
#[derive(Debug, Clone, Copy)]
pub struct PressureThresholds {
    pub max_tokens: usize,
    pub trigger: usize,
    pub target: usize,
    pub resume: usize,
}

impl PressureThresholds {
    pub fn from_fractions(max_tokens: usize, trigger: f64, target: f64, resume: f64) -> Self {
        Self {
            max_tokens,
            trigger: (max_tokens as f64 * trigger) as usize,
            target: (max_tokens as f64 * target) as usize,
            resume: (max_tokens as f64 * resume) as usize,
        }
    }
}

/// Snapshot of context counters for `/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ContextStats {
    pub current_tokens: usize,
    pub max_tokens: usize,
    pub message_count: usize,
    pub offload_count: u64,
    pub pressure_percentage: f64,
}

/// Manages the hot path: token tracking, pressure relief, prompt assembly.
pub struct ContextManager {
    tokenizer: Tokenizer,
    pinned_header: PinnedHeader,
    messages: Vec<Message>,
    /// Token sum over `messages` (the pinned header is counted separately).
    live_tokens: usize,
    thresholds: PressureThresholds,
    /// Set by a shed; while set, the soft trigger is ignored. Cleared
    /// whenever observed usage drops to the resume threshold or below.
    suppressed: bool,
    offload_count: u64,
    queue: Arc<OffloadQueue>,
}

impl ContextManager {
    pub fn new(
        pinned_header: PinnedHeader,
        thresholds: PressureThresholds,
        queue: Arc<OffloadQueue>,
    ) -> Self {
        info!(
            max_tokens = thresholds.max_tokens,
            trigger = thresholds.trigger,
            target = thresholds.target,
            resume = thresholds.resume,
            "context manager initialized"
        );
        Self {
            tokenizer: Tokenizer::new(),
            pinned_header,
            messages: Vec::new(),
            live_tokens: 0,
            thresholds,
            suppressed: false,
            offload_count: 0,
            queue,
        }
    }

    /// Total tokens currently in the window: pinned header plus live messages.
    pub fn current_tokens(&self) -> usize {
        self.pinned_header.token_count(&self.tokenizer) + self.live_tokens
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn pinned_header(&self) -> &PinnedHeader {
        &self.pinned_header
    }

    pub fn pinned_header_mut(&mut self) -> &mut PinnedHeader {
        &mut self.pinned_header
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The most recent user message, if any. Used by the echo guard's
    /// emergency override.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// Appends a message and relieves pressure if required.
    ///
    /// Returns the offload event when a shed fired. The shed itself is
    /// synchronous and bounded by the cost of copying the removed messages
    /// and enqueueing the job; persistence happens later on the cold path.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) -> Option<OffloadEvent> {
        let content = content.into();
        let tokens = self.tokenizer.count_message(role, &content);
        self.messages.push(Message::new(role, content, tokens));
        self.live_tokens += tokens;

        let current = self.current_tokens();
        let percentage = current as f64 / self.thresholds.max_tokens as f64 * 100.0;
        debug!(
            tokens = current,
            max = self.thresholds.max_tokens,
            percentage,
            role = %role,
            "context pressure"
        );
        metrics::gauge!("vicw_context_tokens").set(current as f64);

        if self.suppressed && current <= self.thresholds.resume {
            self.suppressed = false;
            debug!(tokens = current, "pressure suppression cleared");
        }

        let over_hard_cap = current > self.thresholds.max_tokens;
        let over_trigger = current >= self.thresholds.trigger;
        if over_hard_cap || (over_trigger && !self.suppressed) {
            let event = self.relieve_pressure();
            if event.is_some() {
                self.suppressed = true;
                // The shed typically lands at or below the resume threshold;
                // in that case the flag clears right here and the suppression
                // only persists on overshoot (a final exchange too large to
                // shed past).
                if self.current_tokens() <= self.thresholds.resume {
                    self.suppressed = false;
                }
            }
            return event;
        }
        if over_trigger {
            debug!(tokens = current, "over trigger but suppressed, no shed");
        }
        None
    }

    /// Removes the most recently appended assistant message and reverses its
    /// token accounting. Used by the echo guard before a regeneration.
    pub fn rollback_last_assistant(&mut self) -> bool {
        match self.messages.last() {
            Some(msg) if msg.role == Role::Assistant => {
                let msg = self.messages.pop().expect("checked non-empty");
                self.live_tokens -= msg.token_count;
                debug!("rolled back last assistant message");
                true
            }
            _ => false,
        }
    }

    /// Assembles the prompt: pinned header, then state injection, then RAG
    /// injection, then the live messages.
    ///
    /// When the header and injections alone would exceed 90% of the window,
    /// the RAG injection is dropped first, then the state injection; the
    /// pinned header and live messages are never dropped. Pure: repeated
    /// calls with the same inputs yield the same prompt.
    pub fn get_prompt(
        &self,
        state_injection: Option<Message>,
        rag_injection: Option<Message>,
    ) -> Vec<Message> {
        let header_msg = self.pinned_header.to_message(&self.tokenizer);
        let header_tokens = header_msg.as_ref().map(|m| m.token_count).unwrap_or(0);
        let budget = self.thresholds.max_tokens * 9 / 10;

        let mut state_injection = state_injection;
        let mut rag_injection = rag_injection;
        let injected = |a: &Option<Message>, b: &Option<Message>| {
            a.as_ref().map(|m| m.token_count).unwrap_or(0)
                + b.as_ref().map(|m| m.token_count).unwrap_or(0)
        };
        if header_tokens + injected(&state_injection, &rag_injection) > budget {
            debug!("injection budget exceeded, dropping RAG injection");
            rag_injection = None;
        }
        if header_tokens + injected(&state_injection, &rag_injection) > budget {
            debug!("injection budget still exceeded, dropping state injection");
            state_injection = None;
        }

        let mut prompt =
            Vec::with_capacity(self.messages.len() + 3);
        prompt.extend(header_msg);
        prompt.extend(state_injection);
        prompt.extend(rag_injection);
        prompt.extend(self.messages.iter().cloned());
        prompt
    }

    /// Clears live messages and counters. The pinned header and persistent
    /// stores are untouched.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.live_tokens = 0;
        self.suppressed = false;
        self.offload_count = 0;
        info!("context reset");
    }

    pub fn stats(&self) -> ContextStats {
        let current = self.current_tokens();
        ContextStats {
            current_tokens: current,
            max_tokens: self.thresholds.max_tokens,
            message_count: self.messages.len(),
            offload_count: self.offload_count,
            pressure_percentage: current as f64 / self.thresholds.max_tokens as f64 * 100.0,
        }
    }

    fn is_placeholder(msg: &Message) -> bool {
        msg.role == Role::System && msg.content.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Sheds the oldest user/assistant messages into a single chunk until
    /// usage reaches the target, leaving at least the last exchange live.
    ///
    /// Placeholders from earlier sheds may be absorbed by the removal (their
    /// chunks are already persisted) but never enter the new chunk, so the
    /// prefix always collapses back to a single placeholder.
    fn relieve_pressure(&mut self) -> Option<OffloadEvent> {
        let start = Instant::now();
        let tokens_before = self.current_tokens();

        // Leading real system messages are never shed. The removable region
        // must also leave the final user+assistant exchange in place.
        let first_removable = self
            .messages
            .iter()
            .position(|m| Self::is_placeholder(m) || m.role != Role::System)
            .unwrap_or(self.messages.len());
        let keep_tail = 2.min(self.messages.len().saturating_sub(first_removable));
        let last_removable = self.messages.len() - keep_tail;

        let mut removed_tokens = 0;
        let mut end = first_removable;
        while end < last_removable && tokens_before - removed_tokens > self.thresholds.target {
            removed_tokens += self.messages[end].token_count;
            end += 1;
        }

        let any_conversation = self.messages[first_removable..end]
            .iter()
            .any(|m| !Self::is_placeholder(m));
        if end == first_removable || !any_conversation {
            debug!("shed would produce an empty chunk, skipping");
            return None;
        }

        let removed: Vec<Message> = self.messages.drain(first_removable..end).collect();
        self.live_tokens -= removed_tokens;

        let conversation: Vec<&Message> = removed
            .iter()
            .filter(|m| !Self::is_placeholder(m))
            .collect();
        let chunk_tokens: usize = conversation.iter().map(|m| m.token_count).sum();
        let chunk_text: String = conversation
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        self.offload_count += 1;
        let job = OffloadJob::create(
            chunk_text,
            self.pinned_header.render().unwrap_or_default(),
            chunk_tokens,
            conversation.len(),
            serde_json::json!({ "relief_num": self.offload_count }),
        );
        let chunk_id = job.chunk_id.clone();
        let message_count = conversation.len();

        // Non-blocking: a full queue drops the job and the shed still
        // completes from the window's point of view.
        self.queue.enqueue(job);

        let placeholder = Message {
            role: Role::System,
            content: format!(
                "{PLACEHOLDER_PREFIX}{chunk_id} tokens:{chunk_tokens} msgs:{message_count}]"
            ),
            timestamp: chrono::Utc::now(),
            token_count: PLACEHOLDER_TOKEN_COST,
        };
        self.live_tokens += placeholder.token_count;
        self.messages.insert(first_removable, placeholder);

        let tokens_after = self.current_tokens();
        let duration = start.elapsed();
        info!(
            chunk_id = %chunk_id,
            tokens_before,
            tokens_after,
            removed = message_count,
            duration_us = duration.as_micros() as u64,
            "pressure relief complete"
        );
        metrics::counter!("vicw_sheds_total").increment(1);

        Some(OffloadEvent {
            chunk_id,
            tokens_before,
            tokens_after,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max_tokens: usize, header_text: Option<&str>) -> (ContextManager, Arc<OffloadQueue>) {
        let queue = Arc::new(OffloadQueue::new(100));
        let thresholds = PressureThresholds::from_fractions(max_tokens, 0.80, 0.60, 0.70);
        let manager = ContextManager::new(
            PinnedHeader::new(header_text.map(String::from)),
            thresholds,
            Arc::clone(&queue),
        );
        (manager, queue)
    }

    /// A string whose `user: <text>` rendering costs roughly `tokens`.
    fn filler(tokens: usize) -> String {
        "x".repeat(tokens * 4)
    }

    #[test]
    fn add_message_tracks_tokens() {
        let (mut manager, _queue) = manager(1000, None);
        assert_eq!(manager.current_tokens(), 0);
        manager.add_message(Role::User, filler(10));
        assert!(manager.current_tokens() >= 10);
        assert_eq!(manager.message_count(), 1);
    }

    #[test]
    fn pressure_relief_fires_at_trigger() {
        let (mut manager, queue) = manager(100, None);
        // Four ~20-token messages: the fourth crosses the 80-token trigger.
        let mut event = None;
        for _ in 0..4 {
            let fired = manager.add_message(Role::User, filler(18));
            if fired.is_some() {
                event = fired;
            }
        }
        let event = event.expect("shed should have fired");
        assert!(event.tokens_before >= 80);
        assert!(event.tokens_after <= event.tokens_before);
        assert_eq!(queue.len(), 1);
        assert_eq!(manager.stats().offload_count, 1);
    }

    #[test]
    fn shed_reaches_target_and_installs_placeholder() {
        let (mut manager, queue) = manager(100, None);
        for _ in 0..4 {
            manager.add_message(Role::User, filler(18));
        }
        // Post-shed usage is at or below the 60% target plus placeholder.
        assert!(manager.current_tokens() <= 60 + 8 + 20);
        let jobs = queue.drain_batch(10);
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].message_count >= 1);
        // The prompt contains exactly one placeholder.
        let prompt = manager.get_prompt(None, None);
        let placeholders = prompt
            .iter()
            .filter(|m| m.content.starts_with("[ARCHIVED mem_id:"))
            .count();
        assert_eq!(placeholders, 1);
    }

    #[test]
    fn shed_removes_contiguous_prefix_and_keeps_last_exchange() {
        let (mut manager, queue) = manager(100, None);
        manager.add_message(Role::User, filler(18));
        manager.add_message(Role::Assistant, filler(18));
        manager.add_message(Role::User, filler(18));
        let event = manager.add_message(Role::Assistant, filler(18));
        assert!(event.is_some());

        // The final exchange survives.
        let roles: Vec<Role> = manager.get_prompt(None, None).iter().map(|m| m.role).collect();
        assert_eq!(roles.last(), Some(&Role::Assistant));
        assert!(roles.contains(&Role::User));

        // The chunk carries the removed prefix in original order.
        let jobs = queue.drain_batch(1);
        assert!(jobs[0].chunk_text.starts_with("user: "));
    }

    #[test]
    fn chunk_ids_are_unique_across_sheds() {
        let (mut manager, queue) = manager(100, None);
        for _ in 0..20 {
            manager.add_message(Role::User, filler(18));
            manager.add_message(Role::Assistant, filler(18));
        }
        let jobs = queue.drain_batch(100);
        assert!(jobs.len() >= 2, "multiple sheds expected");
        let mut ids: Vec<&str> = jobs.iter().map(|j| j.chunk_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), jobs.len(), "chunk ids must be unique");
    }

    #[test]
    fn pinned_header_is_never_shed() {
        let (mut manager, _queue) = manager(100, Some("persistent plan"));
        for _ in 0..8 {
            manager.add_message(Role::User, filler(18));
        }
        let prompt = manager.get_prompt(None, None);
        assert!(prompt[0].content.contains("persistent plan"));
    }

    #[test]
    fn placeholders_are_not_reshredded() {
        let (mut manager, queue) = manager(100, None);
        for _ in 0..30 {
            manager.add_message(Role::User, filler(18));
            manager.add_message(Role::Assistant, filler(18));
        }
        for job in queue.drain_batch(100) {
            assert!(
                !job.chunk_text.contains("[ARCHIVED mem_id:"),
                "a chunk must never contain a placeholder"
            );
        }
    }

    #[test]
    fn window_never_exceeds_max_after_add() {
        let (mut manager, _queue) = manager(200, None);
        for _ in 0..50 {
            manager.add_message(Role::User, filler(15));
            manager.add_message(Role::Assistant, filler(15));
            assert!(
                manager.current_tokens() <= 200,
                "window exceeded max: {}",
                manager.current_tokens()
            );
        }
    }

    #[test]
    fn rollback_last_assistant_reverses_accounting() {
        let (mut manager, _queue) = manager(1000, None);
        manager.add_message(Role::User, filler(10));
        let before = manager.current_tokens();
        manager.add_message(Role::Assistant, filler(10));
        assert!(manager.rollback_last_assistant());
        assert_eq!(manager.current_tokens(), before);
        // Nothing left to roll back.
        assert!(!manager.rollback_last_assistant());
    }

    #[test]
    fn get_prompt_orders_header_state_rag_live() {
        let (mut manager, _queue) = manager(1000, Some("sys"));
        manager.add_message(Role::User, "hello");
        let state = Message::new(Role::State, "[STATE MEMORY]", 4);
        let rag = Message::new(Role::Rag, "[CONTEXT FROM MEMORY]", 6);
        let prompt = manager.get_prompt(Some(state), Some(rag));
        let roles: Vec<Role> = prompt.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::State, Role::Rag, Role::User]);
    }

    #[test]
    fn get_prompt_is_pure() {
        let (mut manager, _queue) = manager(1000, Some("sys"));
        manager.add_message(Role::User, "hello");
        let a = manager.get_prompt(None, None);
        let b = manager.get_prompt(None, None);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.content, y.content);
        }
    }

    #[test]
    fn oversized_rag_injection_is_dropped_before_state() {
        let (mut manager, _queue) = manager(100, None);
        manager.add_message(Role::User, "hi");
        let state = Message::new(Role::State, "[STATE MEMORY]\nActive goals: g", 10);
        let rag = Message::new(Role::Rag, filler(200), 200);
        let prompt = manager.get_prompt(Some(state), Some(rag));
        assert!(prompt.iter().any(|m| m.role == Role::State));
        assert!(!prompt.iter().any(|m| m.role == Role::Rag));
    }

    #[test]
    fn oversized_state_is_dropped_after_rag() {
        let (mut manager, _queue) = manager(100, None);
        manager.add_message(Role::User, "hi");
        let state = Message::new(Role::State, filler(200), 200);
        let rag = Message::new(Role::Rag, filler(200), 200);
        let prompt = manager.get_prompt(Some(state), Some(rag));
        assert!(!prompt.iter().any(|m| m.role == Role::State));
        assert!(!prompt.iter().any(|m| m.role == Role::Rag));
        // Live messages survive regardless.
        assert!(prompt.iter().any(|m| m.role == Role::User));
    }

    #[test]
    fn reset_clears_messages_but_not_header() {
        let (mut manager, _queue) = manager(1000, Some("keep me"));
        manager.add_message(Role::User, "hello");
        manager.reset();
        assert_eq!(manager.message_count(), 0);
        let prompt = manager.get_prompt(None, None);
        assert_eq!(prompt.len(), 1);
        assert!(prompt[0].content.contains("keep me"));
    }

    #[test]
    fn empty_shed_is_noop() {
        let (mut manager, queue) = manager(100, None);
        // A single message over the trigger: nothing older to remove, so the
        // shed is a no-op and no job is produced.
        let event = manager.add_message(Role::User, filler(90));
        assert!(event.is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn stats_report_pressure_percentage() {
        let (mut manager, _queue) = manager(100, None);
        manager.add_message(Role::User, filler(40));
        let stats = manager.stats();
        assert_eq!(stats.max_tokens, 100);
        assert!(stats.pressure_percentage > 30.0 && stats.pressure_percentage < 60.0);
    }
}
