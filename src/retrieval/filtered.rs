//! Metadata-constrained dense retrieval for identifier-targeted lookups

use crate::config::RetrievalConfig;
use crate::errors::Result;
use crate::providers::Embedder;
use crate::retrieval::{RetrievalResult, RetrievalSource};
use crate::store::{DenseIndex, MetadataFilter};
use std::sync::Arc;

/// Dense retrieval restricted by structured document metadata. Used when
/// the user names a specific test method or document class; results are
/// never fused with the ensemble path.
pub struct FilteredRetriever {
    dense: Arc<dyn DenseIndex>,
    embedder: Arc<dyn Embedder>,
    limit: usize,
}

impl FilteredRetriever {
    pub fn new(
        dense: Arc<dyn DenseIndex>,
        embedder: Arc<dyn Embedder>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            dense,
            embedder,
            limit: config.dense_k,
        }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievalResult>> {
        let embedding = self.embedder.embed(query).await?;

        let hits = if filter.is_empty() {
            self.dense.search(&embedding, self.limit).await?
        } else {
            self.dense
                .search_filtered(&embedding, self.limit, filter)
                .await?
        };

        tracing::debug!(
            hits = hits.len(),
            doc_type = ?filter.doc_type,
            method_id = ?filter.method_id,
            "filtered retrieval complete"
        );

        Ok(hits
            .into_iter()
            .map(|(chunk, score)| RetrievalResult {
                chunk,
                score,
                source: RetrievalSource::MetadataFiltered,
            })
            .collect())
    }
}
