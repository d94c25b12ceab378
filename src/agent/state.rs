//! Turn state machine
//!
//! A deterministic finite state machine over one query turn:
//! - Safety: no invalid states reachable
//! - Liveness: every path ends in Done
//! - Determinism: unique next state per event

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};

/// States of one query turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnState {
    /// Planner is choosing between a direct answer and tool calls
    Planning,

    /// Retrieval tools are running
    ToolExecuting,

    /// Answer is being generated and streamed
    Generating,

    /// Turn finished (terminal)
    Done,
}

/// Events that advance a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// Planner requested tool calls
    ToolsRequested,

    /// Planner answered without tools
    DirectAnswer,

    /// All requested tools finished
    ToolsFinished,

    /// Generation stream ended
    GenerationFinished,

    /// Turn failed; error already reported to the consumer
    Failed,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done)
    }

    /// Attempt a state transition with validation
    ///
    /// Valid transitions:
    /// 1. Planning      → ToolExecuting (on: ToolsRequested)
    /// 2. Planning      → Done          (on: DirectAnswer)
    /// 3. ToolExecuting → Generating    (on: ToolsFinished)
    /// 4. Generating    → Done          (on: GenerationFinished)
    /// 5. `*`           → Done          (on: Failed)
    pub fn transition(&self, event: TurnEvent) -> Result<TurnState> {
        use TurnEvent::*;
        use TurnState::*;

        // Failure is reachable from any state
        if event == Failed {
            return Ok(Done);
        }

        match (self, event) {
            (Planning, ToolsRequested) => Ok(ToolExecuting),
            (Planning, DirectAnswer) => Ok(Done),
            (ToolExecuting, ToolsFinished) => Ok(Generating),
            (Generating, GenerationFinished) => Ok(Done),

            (from, event) => Err(RagError::InvalidTransition {
                from: format!("{:?}", from),
                to: format!("(via {:?})", event),
            }),
        }
    }
}
