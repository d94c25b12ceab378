//! Shared types for conversation and streaming

pub mod messages;

pub use messages::{ChatMessage, ChatRole, StreamEvent, ToolInvocation};
