//! Conversation history
//!
//! Turns alternate user / assistant and are only ever appended in pairs,
//! so the history always has an even length.

use pb_llm::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

/// One side of an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed question and its answer.
    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ConversationTurn::user(question));
        self.turns.push(ConversationTurn::assistant(answer));
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.turns.iter().map(ConversationTurn::to_message).collect()
    }

    /// `Human: ...` / `Assistant: ...` transcript, one line per turn
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| match t.role {
                Role::User => format!("Human: {}", t.content),
                Role::Assistant => format!("Assistant: {}", t.content),
                Role::System => format!("System: {}", t.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
