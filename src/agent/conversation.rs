//! Conversation history store
//!
//! Histories live in memory, keyed by conversation id. Each history sits
//! behind its own async mutex so two turns on the same conversation run
//! one after the other, while turns on different conversations proceed
//! independently.

use crate::types::ChatMessage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type History = Arc<tokio::sync::Mutex<Vec<ChatMessage>>>;

#[derive(Default)]
pub struct ConversationStore {
    histories: Mutex<HashMap<String, History>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the history handle for a conversation, creating an empty one for
    /// a first-seen id.
    pub fn handle(&self, conversation_id: &str) -> History {
        let mut histories = self.histories.lock().expect("conversation map lock");
        histories
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.histories.lock().expect("conversation map lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Messages carried into the next turn's planning context: human turns,
/// system messages, and plain assistant answers. Tool requests and tool
/// results stay within the turn that produced them.
pub fn planning_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter(|m| {
            matches!(
                m.role,
                crate::types::ChatRole::Human | crate::types::ChatRole::System
            ) || m.is_plain_assistant()
        })
        .cloned()
        .collect()
}
