//! Turn orchestration
//!
//! Coordinates one query turn end to end: planning, tool execution, context
//! assembly, streamed generation, and conversation commit. Events flow to
//! the caller over a bounded channel; a dropped receiver cancels the turn
//! and nothing from the turn is committed to conversation history.

use crate::agent::conversation::{planning_history, ConversationStore};
use crate::agent::state::{TurnEvent, TurnState};
use crate::agent::tools::RetrievalTool;
use crate::errors::Result;
use crate::providers::ChatModel;
use crate::rag::ContextAssembler;
use crate::retrieval::{EnsembleRetriever, FilteredRetriever};
use crate::types::{ChatMessage, StreamEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 32;

const QA_INSTRUCTION: &str = "You are an assistant for question-answering tasks. \
    Use the following pieces of retrieved context to answer the question. \
    If you don't know the answer, say that you don't know.";

/// Outcome of one turn's work, before commit
enum TurnOutcome {
    /// Messages to append to conversation history
    Commit(Vec<ChatMessage>),

    /// Receiver dropped mid-turn; discard everything
    Cancelled,
}

#[derive(Clone)]
pub struct AgentOrchestrator {
    chat: Arc<dyn ChatModel>,
    ensemble: Arc<EnsembleRetriever>,
    filtered: Arc<FilteredRetriever>,
    assembler: Arc<ContextAssembler>,
    conversations: Arc<ConversationStore>,
}

impl AgentOrchestrator {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        ensemble: Arc<EnsembleRetriever>,
        filtered: Arc<FilteredRetriever>,
        assembler: Arc<ContextAssembler>,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        Self {
            chat,
            ensemble,
            filtered,
            assembler,
            conversations,
        }
    }

    /// Run one query turn, returning the event stream immediately. A fresh
    /// conversation id is minted when none is given.
    pub fn submit_query(
        &self,
        query: String,
        conversation_id: Option<String>,
    ) -> mpsc::Receiver<StreamEvent> {
        let conversation_id =
            conversation_id.unwrap_or_else(|| format!("thread-{}", Uuid::new_v4()));
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_turn(query, conversation_id, tx).await;
        });

        rx
    }

    async fn run_turn(
        &self,
        query: String,
        conversation_id: String,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        // Serializes turns on the same conversation; held until commit
        let handle = self.conversations.handle(&conversation_id);
        let mut history = handle.lock().await;

        let mut state = TurnState::Planning;

        match self
            .execute_turn(&query, &history, &conversation_id, &tx, &mut state)
            .await
        {
            Ok(TurnOutcome::Commit(turn_messages)) => {
                history.extend(turn_messages);
                let _ = tx
                    .send(StreamEvent::Done {
                        conversation_id: conversation_id.clone(),
                    })
                    .await;
                tracing::debug!(conversation_id = %conversation_id, "turn committed");
            }
            Ok(TurnOutcome::Cancelled) => {
                tracing::debug!(conversation_id = %conversation_id, "turn cancelled by consumer");
            }
            Err(e) => {
                state = state.transition(TurnEvent::Failed).unwrap_or(TurnState::Done);
                tracing::warn!(conversation_id = %conversation_id, ?state, error = %e, "turn failed");
                let _ = tx
                    .send(StreamEvent::Error {
                        message: e.to_string(),
                        conversation_id: conversation_id.clone(),
                    })
                    .await;
                let _ = tx
                    .send(StreamEvent::Done { conversation_id })
                    .await;
            }
        }
    }

    async fn execute_turn(
        &self,
        query: &str,
        history: &[ChatMessage],
        conversation_id: &str,
        tx: &mpsc::Sender<StreamEvent>,
        state: &mut TurnState,
    ) -> Result<TurnOutcome> {
        let mut planning_context = planning_history(history);
        planning_context.push(ChatMessage::human(query));

        let reply = self
            .chat
            .plan(&planning_context, &RetrievalTool::specs())
            .await?;

        let mut turn_messages = vec![ChatMessage::human(query)];

        if reply.is_direct_answer() {
            *state = state.transition(TurnEvent::DirectAnswer)?;
            tracing::debug!(?state, "planner answered without retrieval");

            if send_content(tx, &reply.content, conversation_id).await.is_err() {
                return Ok(TurnOutcome::Cancelled);
            }
            turn_messages.push(ChatMessage::assistant(reply.content));
            return Ok(TurnOutcome::Commit(turn_messages));
        }

        *state = state.transition(TurnEvent::ToolsRequested)?;
        tracing::debug!(?state, tools = reply.tool_calls.len(), "executing retrieval tools");

        turn_messages.push(ChatMessage::assistant_with_calls(
            reply.content.clone(),
            reply.tool_calls.clone(),
        ));

        let mut contexts = Vec::with_capacity(reply.tool_calls.len());
        for invocation in &reply.tool_calls {
            let tool = RetrievalTool::from_invocation(invocation)?;
            let results = match &tool {
                RetrievalTool::IdentifierSearch { .. } => {
                    self.filtered.retrieve(tool.query(), &tool.filter()).await?
                }
                RetrievalTool::GeneralSearch { .. } => {
                    self.ensemble.retrieve(tool.query()).await?
                }
            };

            let context = self.assembler.assemble(tool.query(), &results).await?;
            turn_messages.push(ChatMessage::tool_result(context.clone()));
            contexts.push(context);
        }

        *state = state.transition(TurnEvent::ToolsFinished)?;
        tracing::debug!(?state, "generating answer");

        let mut generation_context = vec![ChatMessage::system(format!(
            "{}\n\n{}",
            QA_INSTRUCTION,
            contexts.join("\n\n")
        ))];
        generation_context.extend(planning_history(history));
        generation_context.push(ChatMessage::human(query));

        let mut fragments = self.chat.generate_stream(&generation_context).await?;
        let mut answer = String::new();

        while let Some(fragment) = fragments.recv().await {
            let text = fragment?;
            answer.push_str(&text);
            if send_content(tx, &text, conversation_id).await.is_err() {
                return Ok(TurnOutcome::Cancelled);
            }
        }

        *state = state.transition(TurnEvent::GenerationFinished)?;
        tracing::debug!(?state, answer_len = answer.len(), "generation complete");

        turn_messages.push(ChatMessage::assistant(answer));
        Ok(TurnOutcome::Commit(turn_messages))
    }
}

async fn send_content(
    tx: &mpsc::Sender<StreamEvent>,
    text: &str,
    conversation_id: &str,
) -> std::result::Result<(), mpsc::error::SendError<StreamEvent>> {
    tx.send(StreamEvent::Content {
        text: text.to_string(),
        conversation_id: conversation_id.to_string(),
    })
    .await
}
