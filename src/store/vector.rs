//! Dense chunk store
//!
//! The serving pipeline only needs three operations: wholesale rebuild,
//! nearest-neighbor search, and metadata-filtered search. They are behind
//! the [`DenseIndex`] trait so tests run against an in-memory index while
//! production uses a Qdrant collection.

use crate::errors::{RagError, Result};
use crate::index::{Chunk, DocType, UNKNOWN_METHOD_ID};
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        vectors_config::Config, with_payload_selector::SelectorOptions, Condition,
        CreateCollection, Distance, FieldCondition, Filter, Match, PointStruct, SearchPoints,
        Value as QdrantValue, VectorParams, VectorsConfig, WithPayloadSelector,
    },
};
use std::collections::HashMap;

/// Structured constraints for identifier-targeted lookups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    /// Wire doc type ("ASTM Test" or "HK Code")
    pub doc_type: Option<String>,

    /// Lowercase method code (e.g. "c109")
    pub method_id: Option<String>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none() && self.method_id.is_none()
    }

    /// Whether a chunk satisfies every present constraint
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(ref doc_type) = self.doc_type {
            if chunk.doc_type.wire_name() != doc_type {
                return false;
            }
        }
        if let Some(ref method_id) = self.method_id {
            if &chunk.method_id != method_id {
                return false;
            }
        }
        true
    }
}

/// Dense similarity index over child chunks
#[async_trait]
pub trait DenseIndex: Send + Sync {
    /// Replace the whole index with a new chunk set. `embeddings` is aligned
    /// with `chunks`.
    async fn rebuild(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Nearest neighbors by embedding, best first
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<(Chunk, f64)>>;

    /// Nearest neighbors restricted to chunks matching the filter
    async fn search_filtered(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(Chunk, f64)>>;
}

/// Qdrant-backed dense index
pub struct QdrantIndex {
    client: QdrantClient,
    collection: String,
    dimensions: u64,
}

impl QdrantIndex {
    pub fn connect(url: &str, collection: &str, dimensions: usize) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| RagError::Configuration(format!("qdrant unreachable at {}: {}", url, e)))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimensions: dimensions as u64,
        })
    }

    /// Check if the Qdrant endpoint is reachable
    pub async fn ping(&self) -> bool {
        self.client.health_check().await.is_ok()
    }

    async fn recreate_collection(&self) -> Result<()> {
        // Ignore the delete result: the collection may not exist yet
        let _ = self.client.delete_collection(&self.collection).await;

        self.client
            .create_collection(&CreateCollection {
                collection_name: self.collection.clone(),
                vectors_config: Some(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: self.dimensions,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::Configuration(format!("failed to create collection: {}", e)))?;

        Ok(())
    }

    async fn run_search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<Filter>,
    ) -> Result<Vec<(Chunk, f64)>> {
        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: embedding.to_vec(),
                limit: limit as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                filter,
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::Provider(format!("dense search failed: {}", e)))?;

        let mut results = Vec::with_capacity(search_result.result.len());
        for point in search_result.result {
            let id = point_id_to_string(&point.id);
            match chunk_from_payload(id, &point.payload) {
                Some(chunk) => results.push((chunk, point.score as f64)),
                None => tracing::warn!("dense index point with malformed payload, skipping"),
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl DenseIndex for QdrantIndex {
    async fn rebuild(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        self.recreate_collection().await?;

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                PointStruct::new(chunk.id.clone(), embedding.clone(), chunk_payload(chunk))
            })
            .collect();

        // Upsert in batches; one oversized request can exceed gRPC limits
        for batch in points.chunks(64) {
            self.client
                .upsert_points_blocking(&self.collection, None, batch.to_vec(), None)
                .await
                .map_err(|e| RagError::Configuration(format!("failed to upsert chunks: {}", e)))?;
        }

        Ok(())
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<(Chunk, f64)>> {
        self.run_search(embedding, limit, None).await
    }

    async fn search_filtered(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<(Chunk, f64)>> {
        let mut must = Vec::new();
        if let Some(ref doc_type) = filter.doc_type {
            must.push(keyword_condition("doc_type", doc_type));
        }
        if let Some(ref method_id) = filter.method_id {
            must.push(keyword_condition("method_id", method_id));
        }

        let qdrant_filter = if must.is_empty() {
            None
        } else {
            Some(Filter {
                must,
                ..Default::default()
            })
        };

        self.run_search(embedding, limit, qdrant_filter).await
    }
}

fn keyword_condition(key: &str, value: &str) -> Condition {
    Condition {
        condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
            FieldCondition {
                key: key.to_string(),
                r#match: Some(Match {
                    match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                        value.to_string(),
                    )),
                }),
                ..Default::default()
            },
        )),
    }
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert("text".to_string(), QdrantValue::from(chunk.text.clone()));
    payload.insert(
        "header_path".to_string(),
        QdrantValue::from(serde_json::to_string(&chunk.header_path).unwrap_or_default()),
    );
    payload.insert(
        "doc_type".to_string(),
        QdrantValue::from(chunk.doc_type.wire_name().to_string()),
    );
    payload.insert(
        "method_id".to_string(),
        QdrantValue::from(chunk.method_id.clone()),
    );
    payload.insert("source".to_string(), QdrantValue::from(chunk.source.clone()));
    if let Some(ref parent_id) = chunk.parent_id {
        payload.insert("parent_id".to_string(), QdrantValue::from(parent_id.clone()));
    }
    payload
}

fn chunk_from_payload(id: String, payload: &HashMap<String, QdrantValue>) -> Option<Chunk> {
    let text = payload_str(payload, "text")?;
    let doc_type = DocType::from_wire(&payload_str(payload, "doc_type")?)?;
    let header_path = payload_str(payload, "header_path")
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    Some(Chunk {
        id,
        text,
        header_path,
        doc_type,
        method_id: payload_str(payload, "method_id")
            .unwrap_or_else(|| UNKNOWN_METHOD_ID.to_string()),
        parent_id: payload_str(payload, "parent_id"),
        source: payload_str(payload, "source").unwrap_or_default(),
    })
}

fn payload_str(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
    payload.get(key).and_then(|value| {
        value.kind.as_ref().and_then(|kind| {
            use qdrant_client::qdrant::value::Kind;
            match kind {
                Kind::StringValue(s) => Some(s.clone()),
                _ => None,
            }
        })
    })
}

fn point_id_to_string(point_id: &Option<qdrant_client::qdrant::PointId>) -> String {
    point_id
        .as_ref()
        .map(|id| {
            use qdrant_client::qdrant::point_id::PointIdOptions;
            match &id.point_id_options {
                Some(PointIdOptions::Num(n)) => n.to_string(),
                Some(PointIdOptions::Uuid(u)) => u.clone(),
                None => String::new(),
            }
        })
        .unwrap_or_default()
}
