//! Query-answering agent
//!
//! One submitted query runs one turn: the planner decides between answering
//! directly and calling retrieval tools, tool results are assembled into
//! context, and the final answer is streamed back over a bounded channel.
//! Turn progress is tracked by a validated state machine.

pub mod conversation;
pub mod orchestrator;
pub mod state;
pub mod tools;

pub use conversation::ConversationStore;
pub use orchestrator::AgentOrchestrator;
pub use state::{TurnEvent, TurnState};
pub use tools::RetrievalTool;
