// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-turn orchestration: admit the user message, retrieve memory, inject
//! state, generate, and guard against echoes.
//!
//! The session mutex is held for the whole turn, serializing turns within
//! one conversation. The pause latch is raised only around generation and
//! is released by an RAII guard on every exit path.

use std::sync::Arc;

use tracing::{info, warn};

use vicw_config::model::{EchoConfig, LlmConfig};
use vicw_core::{
    CompletionRequest, EmbeddingAdapter, Message, ProviderAdapter, Role, VicwError,
};
use vicw_memory::{format_injection, HybridRetriever, StateTracker};

use crate::latch::{PauseGuard, PauseLatch};
use crate::session::Session;

/// What a completed turn reports back to the API layer.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub tokens_in_context: usize,
    pub rag_items_injected: usize,
}

/// Drives one turn at a time through the engine.
pub struct Orchestrator {
    provider: Arc<dyn ProviderAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
    retriever: Arc<HybridRetriever>,
    state_tracker: Arc<StateTracker>,
    latch: Arc<PauseLatch>,
    llm: LlmConfig,
    echo: EchoConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        retriever: Arc<HybridRetriever>,
        state_tracker: Arc<StateTracker>,
        latch: Arc<PauseLatch>,
        llm: LlmConfig,
        echo: EchoConfig,
    ) -> Self {
        Self {
            provider,
            embedder,
            retriever,
            state_tracker,
            latch,
            llm,
            echo,
        }
    }

    /// Handles one user turn end to end.
    pub async fn handle_turn(
        &self,
        session: &Session,
        user_text: &str,
        use_rag: bool,
    ) -> Result<TurnOutcome, VicwError> {
        let mut state = session.state.lock().await;

        // 1. Admit the user message; this may shed, which is non-blocking.
        if let Some(event) = state.context.add_message(Role::User, user_text) {
            info!(
                session_id = %session.id,
                chunk_id = %event.chunk_id,
                tokens_before = event.tokens_before,
                tokens_after = event.tokens_after,
                "shed during user turn"
            );
        }

        // 2. Hybrid retrieval (degrades to nothing on failure).
        let mut rag_items = 0;
        let rag_msg = if use_rag {
            let result = self.retriever.retrieve(user_text).await;
            rag_items = result.total_items();
            format_injection(&result).map(|content| {
                let tokens = state.context.tokenizer().count_message(Role::Rag, &content);
                Message::new(Role::Rag, content, tokens)
            })
        } else {
            None
        };

        // 3. State-memory injection (degrades to nothing on failure).
        let state_msg = match self.state_tracker.build_state_injection().await {
            Ok(Some(content)) => {
                let tokens = state.context.tokenizer().count_message(Role::State, &content);
                Some(Message::new(Role::State, content, tokens))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "state injection failed, continuing without it");
                None
            }
        };

        // 4-5. Generate under the pause latch, with echo guarding.
        let response_text = {
            let _pause = PauseGuard::hold(Arc::clone(&self.latch));
            self.generate_with_echo_guard(&mut state, state_msg, rag_msg)
                .await?
        };

        // 6. Accept the response into the context.
        if let Some(event) = state.context.add_message(Role::Assistant, &response_text) {
            info!(
                session_id = %session.id,
                chunk_id = %event.chunk_id,
                "shed during assistant turn"
            );
        }

        Ok(TurnOutcome {
            response: response_text,
            tokens_in_context: state.context.current_tokens(),
            rag_items_injected: rag_items,
        })
    }

    /// Generation loop: accept the first non-echo response, escalating
    /// warnings on each rejection, up to the configured retry budget.
    async fn generate_with_echo_guard(
        &self,
        state: &mut crate::session::SessionState,
        state_msg: Option<Message>,
        rag_msg: Option<Message>,
    ) -> Result<String, VicwError> {
        let max_retries = if self.echo.enabled {
            self.echo.max_attempts
        } else {
            0
        };
        let mut warning: Option<Message> = None;
        let mut last_text = String::new();
        let mut last_embedding: Option<Vec<f32>> = None;

        for retry in 0..=max_retries {
            let final_retry = retry == max_retries && retry > 0;
            let mut prompt = if final_retry && self.echo.strip_context_on_final_retry {
                self.emergency_prompt(state)
            } else {
                state.context.get_prompt(state_msg.clone(), rag_msg.clone())
            };
            if let Some(warning) = &warning {
                prompt.push(warning.clone());
            }

            let response = self
                .provider
                .complete(CompletionRequest {
                    messages: prompt,
                    max_tokens: self.llm.max_output_tokens,
                    temperature: self.llm.temperature,
                })
                .await?;
            last_text = response.text;

            if !self.echo.enabled {
                return Ok(last_text);
            }

            let embedding = match self.embedder.embed(&last_text).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(error = %e, "response embedding failed, skipping echo check");
                    return Ok(last_text);
                }
            };

            let similarity = state.echo_ring.max_similarity(&embedding);
            if similarity < self.echo.similarity_threshold {
                state.echo_ring.push(embedding, &last_text);
                return Ok(last_text);
            }

            last_embedding = Some(embedding);
            metrics::counter!("vicw_echo_rejections_total").increment(1);
            warn!(
                similarity = similarity as f64,
                retry = retry + 1,
                max_retries,
                "echo detected, regenerating"
            );
            warning = Some(self.escalation_warning(retry + 1, &last_text, state));
        }

        // Retry budget exhausted: accept the last response anyway.
        metrics::counter!("vicw_echo_guard_exhausted_total").increment(1);
        warn!("echo guard exhausted, accepting repeated response");
        if let Some(embedding) = last_embedding {
            state.echo_ring.push(embedding, &last_text);
        }
        Ok(last_text)
    }

    /// Escalation tiers: polite, then forceful with the forbidden phrasing
    /// quoted, then the directive used alongside the stripped prompt.
    fn escalation_warning(
        &self,
        retry: u32,
        rejected_text: &str,
        state: &crate::session::SessionState,
    ) -> Message {
        let content = match retry {
            1 => "Your last answer was nearly identical to a recent response. \
                  Provide new information or a different angle."
                .to_string(),
            2 => {
                let snippet: String = rejected_text.chars().take(80).collect();
                format!(
                    "You are repeating yourself. Do NOT reuse the phrasing \"{snippet}\". \
                     State a concrete next action or new information instead."
                )
            }
            _ => "You are stuck in a loop. Conclude the current topic or pivot to a new one \
                  in a single short reply."
                .to_string(),
        };
        let tokens = state.context.tokenizer().count_message(Role::System, &content);
        Message::new(Role::System, content, tokens)
    }

    /// Emergency override prompt: pinned header, the most recent user turn,
    /// and nothing else. The escalation directive is appended by the caller.
    fn emergency_prompt(&self, state: &crate::session::SessionState) -> Vec<Message> {
        let mut prompt = Vec::new();
        if let Some(header) = state
            .context
            .pinned_header()
            .to_message(state.context.tokenizer())
        {
            prompt.push(header);
        }
        if let Some(user) = state.context.last_user_message() {
            prompt.push(user.clone());
        }
        prompt
    }
}
