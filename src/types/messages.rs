//! Message types for conversation state and streaming delivery
//!
//! Defines the structured messages exchanged between the orchestrator,
//! the generation provider, and the serving interface.

use serde::{Deserialize, Serialize};

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// System instruction
    System,

    /// End-user query
    Human,

    /// Model output (may carry tool calls)
    Assistant,

    /// Retrieval tool result
    Tool,
}

/// A tool invocation requested by the generation provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Declared tool name
    pub name: String,

    /// Arguments as produced by the provider
    pub arguments: serde_json::Value,
}

/// One entry of conversation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,

    /// Tool calls attached to an assistant message during planning.
    /// Empty for all other roles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Human,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolInvocation>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: calls,
        }
    }

    /// True for assistant messages that carry no tool calls. Only these are
    /// replayed into the generation prompt; tool-call-bearing intermediates
    /// and tool results are not.
    pub fn is_plain_assistant(&self) -> bool {
        self.role == ChatRole::Assistant && self.tool_calls.is_empty()
    }
}

/// One fragment of the serving stream for a turn.
///
/// Delivered over a bounded channel; `Done` is the sentinel terminator and
/// always the last event of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Finalized assistant-authored answer content
    Content {
        text: String,
        conversation_id: String,
    },

    /// Turn-terminating failure, human-readable
    Error {
        message: String,
        conversation_id: String,
    },

    /// End of turn
    Done { conversation_id: String },
}

impl StreamEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            StreamEvent::Content {
                conversation_id, ..
            }
            | StreamEvent::Error {
                conversation_id, ..
            }
            | StreamEvent::Done { conversation_id } => conversation_id,
        }
    }
}
