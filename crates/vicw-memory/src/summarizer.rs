// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extractive summarization for offloaded chunks.
//!
//! Takes the leading and trailing sentences of the chunk text. Deterministic
//! and CPU-cheap, which is what the cold path needs: the summary feeds the
//! embedding and the graph node, not a human reader.

/// Splits text into sentences on `.`, `!`, `?` boundaries.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.char_indices().collect::<Vec<_>>();
    for (i, (pos, c)) in bytes.iter().enumerate() {
        if matches!(c, '.' | '!' | '?') {
            let followed_by_space = bytes
                .get(i + 1)
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true);
            if followed_by_space {
                let end = pos + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Deterministic extractive summarizer: first `lead` sentences plus last
/// `tail` sentences, truncated to a token budget.
#[derive(Debug, Clone)]
pub struct Summarizer {
    lead: usize,
    tail: usize,
    max_tokens: usize,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self {
            lead: 2,
            tail: 1,
            max_tokens: 256,
        }
    }
}

impl Summarizer {
    pub fn new(lead: usize, tail: usize, max_tokens: usize) -> Self {
        Self {
            lead,
            tail,
            max_tokens,
        }
    }

    /// Produces the summary. Text under 100 chars is returned unchanged.
    pub fn summarize(&self, text: &str) -> String {
        if text.chars().count() < 100 {
            return text.to_string();
        }

        let sentences = split_sentences(text);
        let summary = if sentences.len() <= self.lead + self.tail {
            text.to_string()
        } else {
            let lead = sentences[..self.lead].join(" ");
            let tail = sentences[sentences.len() - self.tail..].join(" ");
            format!("{lead} [...] {tail}")
        };

        self.truncate_tokens(summary)
    }

    fn truncate_tokens(&self, summary: String) -> String {
        // chars/4 estimation, same ratio the hot path uses.
        let max_chars = self.max_tokens * 4;
        if summary.chars().count() <= max_chars {
            return summary;
        }
        let truncated: String = summary.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
