//! Shared fakes for integration tests: an in-memory dense index, a
//! deterministic embedder, a token-overlap reranker, and a scripted chat
//! model that records the contexts it was given.

use async_trait::async_trait;
use concretebuddy::errors::Result;
use concretebuddy::index::Chunk;
use concretebuddy::providers::{ChatModel, Embedder, PlannerReply, Reranker, ToolSpec};
use concretebuddy::store::{DenseIndex, MetadataFilter};
use concretebuddy::types::ChatMessage;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use tokio::sync::mpsc;

const EMBED_DIMS: usize = 32;

/// Deterministic bag-of-words embedder: each token hashes into one of the
/// dimensions, so texts sharing tokens have higher cosine similarity.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; EMBED_DIMS];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            vector[(hasher.finish() as usize) % EMBED_DIMS] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        EMBED_DIMS
    }
}

/// Cosine-similarity dense index backed by a Vec
#[derive(Default)]
pub struct InMemoryDenseIndex {
    points: Mutex<Vec<(Chunk, Vec<f32>)>>,
}

impl InMemoryDenseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn ranked(&self, embedding: &[f32], filter: Option<&MetadataFilter>) -> Vec<(Chunk, f64)> {
        let points = self.points.lock().unwrap();
        let mut hits: Vec<(Chunk, f64)> = points
            .iter()
            .filter(|(chunk, _)| filter.map_or(true, |f| f.matches(chunk)))
            .map(|(chunk, vector)| (chunk.clone(), cosine(embedding, vector)))
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }
}

#[async_trait]
impl DenseIndex for InMemoryDenseIndex {
    async fn rebuild(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        assert_eq!(chunks.len(), embeddings.len());
        *self.points.lock().unwrap() = chunks
            .iter()
            .cloned()
            .zip(embeddings.iter().cloned())
            .collect();
        Ok(())
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<(Chunk, f64)>> {
        let mut hits = self.ranked(embedding, None);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn search_filtered(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(Chunk, f64)>> {
        let mut hits = self.ranked(embedding, Some(filter));
        hits.truncate(limit);
        Ok(hits)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

/// Scores each document by token overlap with the query
pub struct OverlapReranker;

#[async_trait]
impl Reranker for OverlapReranker {
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f64>> {
        let query_tokens: Vec<String> = tokens(query);
        Ok(texts
            .iter()
            .map(|text| {
                let doc_tokens = tokens(text);
                let overlap = query_tokens
                    .iter()
                    .filter(|t| doc_tokens.contains(t))
                    .count();
                overlap as f64 / (query_tokens.len().max(1)) as f64
            })
            .collect())
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Chat model with preset planner replies and generation fragments. Records
/// every context it receives so tests can assert on prompt construction.
pub struct ScriptedChat {
    plans: Mutex<VecDeque<PlannerReply>>,
    fragments: Mutex<VecDeque<Vec<String>>>,
    pub plan_contexts: Mutex<Vec<Vec<ChatMessage>>>,
    pub generate_contexts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(plans: Vec<PlannerReply>, fragments: Vec<Vec<String>>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            fragments: Mutex::new(fragments.into()),
            plan_contexts: Mutex::new(Vec::new()),
            generate_contexts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn plan(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<PlannerReply> {
        self.plan_contexts.lock().unwrap().push(messages.to_vec());
        Ok(self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted plan available"))
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<Result<String>>> {
        self.generate_contexts
            .lock()
            .unwrap()
            .push(messages.to_vec());

        let fragments = self
            .fragments
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted fragments available");

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}
