//! Request-scoped conversation context.
//!
//! Built fresh per incoming message by the orchestrator, handed to the
//! persona synthesizer, and discarded once the reply is produced.

use crate::{EmotionalTone, Fact, HistoryTurn, Language};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All inputs the persona synthesizer needs for one reply.
///
/// History and fact lists are capped at construction time so prompt size
/// stays bounded no matter what the caller loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Canonical user id.
    pub user_id: Uuid,
    /// Display name used in the prompt.
    pub user_name: String,
    /// The message being replied to.
    pub message: String,
    /// Detected language of the message.
    pub language: Language,
    /// Recent turns, oldest first.
    pub history: Vec<HistoryTurn>,
    /// Retrieved facts, most relevant first.
    pub facts: Vec<Fact>,
    /// Pre-classified tone; None means the synthesizer classifies it.
    pub emotional_tone: Option<EmotionalTone>,
    /// Whether gentle grammar correction should be layered in.
    pub is_grammar_mode: bool,
}

impl ConversationContext {
    /// Create a context with required fields.
    pub fn new(user_id: Uuid, user_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            message: message.into(),
            language: Language::default(),
            history: Vec::new(),
            facts: Vec::new(),
            emotional_tone: None,
            is_grammar_mode: false,
        }
    }

    /// Set the detected language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Attach history, keeping only the most recent `window` turns
    /// (oldest-first ordering is preserved).
    pub fn with_history(mut self, mut turns: Vec<HistoryTurn>, window: usize) -> Self {
        if turns.len() > window {
            turns.drain(..turns.len() - window);
        }
        self.history = turns;
        self
    }

    /// Attach retrieved facts, keeping at most `top_k`.
    pub fn with_facts(mut self, mut facts: Vec<Fact>, top_k: usize) -> Self {
        facts.truncate(top_k);
        self.facts = facts;
        self
    }

    /// Pre-set the emotional tone.
    pub fn with_tone(mut self, tone: EmotionalTone) -> Self {
        self.emotional_tone = Some(tone);
        self
    }

    /// Enable grammar-tutoring behavior.
    pub fn with_grammar_mode(mut self, enabled: bool) -> Self {
        self.is_grammar_mode = enabled;
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;

    fn turn(content: &str) -> HistoryTurn {
        HistoryTurn {
            role: MessageRole::User,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_new_defaults() {
        let ctx = ConversationContext::new(Uuid::now_v7(), "Asha", "hello");
        assert_eq!(ctx.language, Language::English);
        assert!(ctx.history.is_empty());
        assert!(ctx.facts.is_empty());
        assert!(ctx.emotional_tone.is_none());
        assert!(!ctx.is_grammar_mode);
    }

    #[test]
    fn test_history_cap_keeps_most_recent() {
        let turns: Vec<HistoryTurn> = (0..15).map(|i| turn(&format!("turn {}", i))).collect();
        let ctx = ConversationContext::new(Uuid::now_v7(), "Asha", "hello")
            .with_history(turns, 10);

        assert_eq!(ctx.history.len(), 10);
        assert_eq!(ctx.history.first().unwrap().content, "turn 5");
        assert_eq!(ctx.history.last().unwrap().content, "turn 14");
    }

    #[test]
    fn test_history_under_cap_is_untouched() {
        let turns: Vec<HistoryTurn> = (0..3).map(|i| turn(&format!("turn {}", i))).collect();
        let ctx = ConversationContext::new(Uuid::now_v7(), "Asha", "hello")
            .with_history(turns, 10);
        assert_eq!(ctx.history.len(), 3);
    }

    #[test]
    fn test_facts_cap() {
        let user_id = Uuid::now_v7();
        let facts: Vec<Fact> = (0..8)
            .map(|i| Fact::new(user_id, format!("E{}", i), "friend", "a", "v", "ctx"))
            .collect();
        let ctx = ConversationContext::new(user_id, "Asha", "hello").with_facts(facts, 5);

        assert_eq!(ctx.facts.len(), 5);
        // Most relevant (front of the list) survive truncation.
        assert_eq!(ctx.facts[0].entity, "E0");
    }
}
