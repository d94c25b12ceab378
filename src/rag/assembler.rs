//! Reranking and parent substitution
//!
//! Retrieved child chunks are precise but narrow. After reranking, each
//! surviving child is swapped for its full parent section so the generator
//! sees complete procedures instead of fragments; a child whose parent
//! cannot be resolved falls back to its own text rather than dropping out.

use crate::errors::Result;
use crate::providers::Reranker;
use crate::retrieval::RetrievalResult;
use crate::store::ParentStore;
use std::sync::Arc;

/// Separator between context sections in the generation prompt
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub struct ContextAssembler {
    reranker: Arc<dyn Reranker>,
    parents: ParentStore,
    top_n: usize,
}

impl ContextAssembler {
    pub fn new(reranker: Arc<dyn Reranker>, parents: ParentStore, top_n: usize) -> Self {
        Self {
            reranker,
            parents,
            top_n,
        }
    }

    /// Build the context string for one retrieval round. Returns an empty
    /// string when nothing was retrieved.
    pub async fn assemble(&self, query: &str, results: &[RetrievalResult]) -> Result<String> {
        if results.is_empty() {
            return Ok(String::new());
        }

        let texts: Vec<String> = results.iter().map(|r| r.chunk.text.clone()).collect();
        let scores = self.reranker.rerank(query, &texts).await?;

        // Stable sort by rerank score; equal scores keep retrieval order
        let mut order: Vec<usize> = (0..results.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(self.top_n);

        let kept: Vec<&RetrievalResult> = order.iter().map(|&i| &results[i]).collect();

        let parent_ids: Vec<String> = kept
            .iter()
            .filter_map(|r| r.chunk.parent_id.clone())
            .collect();
        let parents = self.parents.get_batch(&parent_ids);

        let sections: Vec<&str> = kept
            .iter()
            .map(|r| {
                r.chunk
                    .parent_id
                    .as_ref()
                    .and_then(|id| parents.get(id))
                    .map(|parent| parent.text.as_str())
                    .unwrap_or(r.chunk.text.as_str())
            })
            .collect();

        tracing::debug!(
            candidates = results.len(),
            kept = sections.len(),
            parents_resolved = parents.len(),
            "context assembled"
        );

        Ok(sections.join(CONTEXT_SEPARATOR))
    }
}
