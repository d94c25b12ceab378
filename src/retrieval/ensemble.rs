//! Hybrid lexical + dense retrieval with reciprocal-rank fusion

use crate::config::RetrievalConfig;
use crate::errors::Result;
use crate::index::Chunk;
use crate::providers::Embedder;
use crate::retrieval::{RetrievalResult, RetrievalSource};
use crate::store::{DenseIndex, LexicalIndex};
use std::collections::HashMap;
use std::sync::Arc;

/// Rank-offset constant for reciprocal-rank fusion
const RRF_K: f64 = 60.0;

/// Fuses the lexical and dense rankings for one query. Fusion works on
/// ranks only, so the two backends' incomparable score scales never mix.
pub struct EnsembleRetriever {
    lexical: Arc<LexicalIndex>,
    dense: Arc<dyn DenseIndex>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl EnsembleRetriever {
    pub fn new(
        lexical: Arc<LexicalIndex>,
        dense: Arc<dyn DenseIndex>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            lexical,
            dense,
            embedder,
            config,
        }
    }

    /// Retrieve from both backends and fuse. Results are ordered by fused
    /// score, ties keeping first-seen order across (lexical, dense) lists.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        let lexical_hits = self.lexical.search(query, self.config.lexical_k);

        let embedding = self.embedder.embed(query).await?;
        let dense_hits = self.dense.search(&embedding, self.config.dense_k).await?;

        tracing::debug!(
            lexical = lexical_hits.len(),
            dense = dense_hits.len(),
            "retrieved candidate chunks"
        );

        let ranked = [
            (lexical_hits, self.config.lexical_weight, RetrievalSource::Lexical),
            (dense_hits, self.config.dense_weight, RetrievalSource::Dense),
        ];

        Ok(fuse(ranked))
    }
}

/// Weighted reciprocal-rank fusion keyed by chunk id. Each list contributes
/// `weight / (RRF_K + rank + 1)` for a chunk at zero-based `rank`; a chunk
/// in both lists accumulates both contributions but is emitted once, with
/// the source of its first appearance.
fn fuse(ranked_lists: [(Vec<(Chunk, f64)>, f64, RetrievalSource); 2]) -> Vec<RetrievalResult> {
    let mut order: Vec<String> = Vec::new();
    let mut fused: HashMap<String, RetrievalResult> = HashMap::new();

    for (hits, weight, source) in ranked_lists {
        for (rank, (chunk, _)) in hits.into_iter().enumerate() {
            let contribution = weight / (RRF_K + rank as f64 + 1.0);
            match fused.get_mut(&chunk.id) {
                Some(existing) => existing.score += contribution,
                None => {
                    order.push(chunk.id.clone());
                    fused.insert(
                        chunk.id.clone(),
                        RetrievalResult {
                            chunk,
                            score: contribution,
                            source,
                        },
                    );
                }
            }
        }
    }

    let mut results: Vec<RetrievalResult> = order
        .into_iter()
        .map(|id| fused.remove(&id).expect("fused entry for ordered id"))
        .collect();

    // Stable sort keeps first-seen order for equal scores
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    results
}
