// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pinned header: a prompt prefix that is never shed.
//!
//! Holds the session's durable framing (system text, goals, constraints,
//! definitions). It is concatenated verbatim at the top of every prompt and
//! is excluded from every shed.

use std::collections::BTreeMap;

use vicw_core::{Message, Role};

use crate::tokenizer::Tokenizer;

/// Persistent context header that never gets offloaded.
#[derive(Debug, Clone, Default)]
pub struct PinnedHeader {
    /// Free-form system text (loaded from config or a system-prompt file).
    pub system_text: Option<String>,
    pub goals: Vec<String>,
    pub constraints: Vec<String>,
    /// Term definitions, rendered in sorted order for stable prompts.
    pub definitions: BTreeMap<String, String>,
    pub active_entities: Vec<String>,
}

impl PinnedHeader {
    pub fn new(system_text: Option<String>) -> Self {
        Self {
            system_text,
            ..Self::default()
        }
    }

    /// True when the header renders to nothing.
    pub fn is_empty(&self) -> bool {
        self.system_text.is_none()
            && self.goals.is_empty()
            && self.constraints.is_empty()
            && self.definitions.is_empty()
            && self.active_entities.is_empty()
    }

    /// Renders the header text, or `None` when there is nothing to pin.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut parts = Vec::new();
        if let Some(text) = &self.system_text {
            parts.push(text.clone());
        }
        if !self.goals.is_empty() {
            parts.push(format!("GOALS: {}", self.goals.join(", ")));
        }
        if !self.constraints.is_empty() {
            parts.push(format!("CONSTRAINTS: {}", self.constraints.join(", ")));
        }
        if !self.definitions.is_empty() {
            let defs: Vec<String> = self
                .definitions
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect();
            parts.push(format!("DEFINITIONS: {}", defs.join(", ")));
        }
        if !self.active_entities.is_empty() {
            parts.push(format!("ACTIVE ENTITIES: {}", self.active_entities.join(", ")));
        }
        Some(format!(
            "[PINNED STATE]\n{}\n[END PINNED STATE]",
            parts.join("\n")
        ))
    }

    /// Renders the header as a system message with token accounting.
    pub fn to_message(&self, tokenizer: &Tokenizer) -> Option<Message> {
        let content = self.render()?;
        let tokens = tokenizer.count_message(Role::System, &content);
        Some(Message::new(Role::System, content, tokens))
    }

    /// Token cost of the rendered header, zero when empty.
    pub fn token_count(&self, tokenizer: &Tokenizer) -> usize {
        self.render()
            .map(|text| tokenizer.count_message(Role::System, &text))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_header_renders_nothing() {
        let header = PinnedHeader::default();
        assert!(header.is_empty());
        assert!(header.render().is_none());
        assert_eq!(header.token_count(&Tokenizer::new()), 0);
    }

    #[test]
    fn system_text_only() {
        let header = PinnedHeader::new(Some("You are a navigator.".into()));
        let rendered = header.render().unwrap();
        assert!(rendered.starts_with("[PINNED STATE]"));
        assert!(rendered.contains("You are a navigator."));
        assert!(rendered.ends_with("[END PINNED STATE]"));
    }

    #[test]
    fn sections_render_in_fixed_order() {
        let mut header = PinnedHeader::new(Some("sys".into()));
        header.goals.push("restore power".into());
        header.constraints.push("no detours".into());
        header.definitions.insert("grid".into(), "the power grid".into());
        let rendered = header.render().unwrap();
        let goals_at = rendered.find("GOALS:").unwrap();
        let constraints_at = rendered.find("CONSTRAINTS:").unwrap();
        let defs_at = rendered.find("DEFINITIONS:").unwrap();
        assert!(goals_at < constraints_at && constraints_at < defs_at);
    }

    #[test]
    fn to_message_uses_system_role() {
        let header = PinnedHeader::new(Some("sys".into()));
        let msg = header.to_message(&Tokenizer::new()).unwrap();
        assert_eq!(msg.role, Role::System);
        assert!(msg.token_count > 0);
    }
}
