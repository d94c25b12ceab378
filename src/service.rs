//! Service facade
//!
//! Wires configuration into the provider clients, stores, retrievers, and
//! orchestrator. One [`RagService`] value owns a full serving pipeline;
//! nothing here is process-global.

use crate::agent::{AgentOrchestrator, ConversationStore};
use crate::config::Config;
use crate::errors::Result;
use crate::index::{IndexBuilder, IndexSummary};
use crate::providers::{ChatModel, Embedder, OllamaProvider, PromptReranker, Reranker};
use crate::rag::ContextAssembler;
use crate::retrieval::{EnsembleRetriever, FilteredRetriever};
use crate::store::{DenseIndex, LexicalIndex, ParentStore, QdrantIndex};
use crate::types::StreamEvent;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Reachability and artifact status for the `health` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub ollama: bool,
    pub qdrant: bool,
    pub lexical_snapshot: bool,
    pub parent_store: bool,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.ollama && self.qdrant && self.lexical_snapshot && self.parent_store
    }
}

/// A fully wired question-answering service
pub struct RagService {
    orchestrator: AgentOrchestrator,
}

impl RagService {
    /// Connect to the providers and open the index artifacts for serving.
    /// Fails fast when an artifact from a previous indexing run is missing.
    pub fn connect(config: &Config) -> Result<Self> {
        let provider = Arc::new(OllamaProvider::new(&config.ollama)?);
        let chat: Arc<dyn ChatModel> = provider.clone();
        let embedder: Arc<dyn Embedder> = provider.clone();

        let dense: Arc<dyn DenseIndex> = Arc::new(QdrantIndex::connect(
            &config.paths.qdrant_url,
            &config.paths.collection,
            provider.dimensions(),
        )?);

        let lexical = Arc::new(LexicalIndex::load(&config.paths.lexical_snapshot)?);
        let parents = ParentStore::open(&config.paths.parent_store)?;

        tracing::info!(
            chunks = lexical.len(),
            collection = %config.paths.collection,
            "serving pipeline connected"
        );

        let reranker: Arc<dyn Reranker> = Arc::new(PromptReranker::new(chat.clone()));

        let ensemble = Arc::new(EnsembleRetriever::new(
            lexical,
            dense.clone(),
            embedder.clone(),
            config.retrieval.clone(),
        ));
        let filtered = Arc::new(FilteredRetriever::new(dense, embedder, &config.retrieval));
        let assembler = Arc::new(ContextAssembler::new(
            reranker,
            parents,
            config.retrieval.rerank_top_n,
        ));

        Ok(Self {
            orchestrator: AgentOrchestrator::new(
                chat,
                ensemble,
                filtered,
                assembler,
                Arc::new(ConversationStore::new()),
            ),
        })
    }

    /// Run one query turn. See [`AgentOrchestrator::submit_query`].
    pub fn submit_query(
        &self,
        query: String,
        conversation_id: Option<String>,
    ) -> mpsc::Receiver<StreamEvent> {
        self.orchestrator.submit_query(query, conversation_id)
    }

    /// Rebuild all index artifacts from a document directory. Runs without
    /// a connected serving pipeline; `data_dir` overrides the configured one.
    pub async fn build_index(config: &Config, data_dir: Option<&Path>) -> Result<IndexSummary> {
        let provider = Arc::new(OllamaProvider::new(&config.ollama)?);

        let dense: Arc<dyn DenseIndex> = Arc::new(QdrantIndex::connect(
            &config.paths.qdrant_url,
            &config.paths.collection,
            provider.dimensions(),
        )?);

        let builder = IndexBuilder::new(
            provider,
            dense,
            ParentStore::new(&config.paths.parent_store),
            &config.paths.lexical_snapshot,
        );

        builder
            .build(data_dir.unwrap_or(&config.paths.data_dir))
            .await
    }

    /// Probe providers and artifacts without failing on the first problem
    pub async fn health_check(config: &Config) -> HealthReport {
        let ollama = match OllamaProvider::new(&config.ollama) {
            Ok(provider) => provider.health_check().await.unwrap_or(false),
            Err(_) => false,
        };

        let qdrant = match QdrantIndex::connect(&config.paths.qdrant_url, &config.paths.collection, 0)
        {
            Ok(index) => index.ping().await,
            Err(_) => false,
        };

        HealthReport {
            ollama,
            qdrant,
            lexical_snapshot: config.paths.lexical_snapshot.is_file(),
            parent_store: config.paths.parent_store.is_dir(),
        }
    }
}
