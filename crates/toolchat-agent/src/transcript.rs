//! Conversation transcript: the ordered user/assistant turns of one session.

use toolchat_core::types::{Message, Turn};

/// Append-only history of the current session, cleared on reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one exchange: the user turn, then the assistant turn.
    pub fn record_turn(&mut self, user_text: impl Into<String>, assistant_text: impl Into<String>) {
        self.turns.push(Turn::user(user_text));
        self.turns.push(Turn::assistant(assistant_text));
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The turns as chat messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.turns.iter().map(Turn::to_message).collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
