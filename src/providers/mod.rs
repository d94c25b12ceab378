//! Provider interfaces consumed by the retrieval and generation pipeline
//!
//! Embedding, reranking, and generation are opaque external services. The
//! traits here are the only coupling point; the Ollama implementations live
//! in [`ollama`] and [`reranker`].

pub mod ollama;
pub mod reranker;

use crate::errors::Result;
use crate::types::{ChatMessage, ToolInvocation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use ollama::OllamaProvider;
pub use reranker::PromptReranker;

/// Embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts, aligned to input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Embedding dimensions
    fn dimensions(&self) -> usize;
}

/// Cross-encoder style relevance scoring
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score each (query, text) pair. Scores are aligned to input order.
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f64>>;
}

/// Declared capability for one retrieval tool, passed to the generation
/// provider during planning. Selection between tools is the provider's own
/// judgment given the description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,

    /// JSON Schema for the tool arguments
    pub parameters: serde_json::Value,
}

/// Planner output: a direct answer, zero or more tool invocations, or both
#[derive(Debug, Clone, Default)]
pub struct PlannerReply {
    pub content: String,
    pub tool_calls: Vec<ToolInvocation>,
}

impl PlannerReply {
    pub fn is_direct_answer(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Conversational generation with optional tool capability
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One non-streamed completion with a declared capability set.
    /// Pass an empty slice to disable tool exposure.
    async fn plan(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<PlannerReply>;

    /// Streamed completion without tool capability. Fragments arrive over a
    /// bounded channel in generation order; channel close is end of output.
    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<Result<String>>>;
}
