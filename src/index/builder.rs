//! Offline index construction
//!
//! Walks a document directory, classifies and splits each file, links
//! children to parents, then rebuilds all three artifacts wholesale: the
//! dense chunk index, the lexical snapshot, and the parent store. Nothing
//! is written until the whole corpus has produced at least one chunk, so a
//! misconfigured data directory fails without clobbering a previous index.

use crate::errors::{RagError, Result};
use crate::index::splitter::{split_by_headings, CHILD_SPLIT_DEPTH, PARENT_SPLIT_DEPTH};
use crate::index::{Chunk, DocType, ParentChunk, UNKNOWN_METHOD_ID};
use crate::providers::Embedder;
use crate::store::{DenseIndex, LexicalIndex, ParentStore};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use walkdir::WalkDir;

/// Result of one indexing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub documents: usize,
    pub skipped: usize,
    pub chunks: usize,
    pub parents: usize,
}

pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    dense: Arc<dyn DenseIndex>,
    parent_store: ParentStore,
    lexical_snapshot: PathBuf,
    method_id_pattern: Regex,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        dense: Arc<dyn DenseIndex>,
        parent_store: ParentStore,
        lexical_snapshot: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            dense,
            parent_store,
            lexical_snapshot: lexical_snapshot.into(),
            // One letter followed by digits, e.g. "c109" in "astm_c109.md"
            method_id_pattern: Regex::new(r"[A-Za-z]\d+").expect("valid method id pattern"),
        }
    }

    /// Build all index artifacts from a directory of markdown documents
    pub async fn build(&self, data_dir: &Path) -> Result<IndexSummary> {
        let mut all_chunks: Vec<Chunk> = Vec::new();
        let mut all_parents: Vec<ParentChunk> = Vec::new();
        let mut documents = 0usize;
        let mut skipped = 0usize;

        for entry in WalkDir::new(data_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                continue;
            }
            documents += 1;

            match self.ingest_document(path) {
                Ok((chunks, parents)) => {
                    all_chunks.extend(chunks);
                    all_parents.extend(parents);
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(document = %path.display(), error = %e, "skipping document");
                }
            }
        }

        if all_chunks.is_empty() {
            return Err(RagError::Configuration(format!(
                "no ingestible documents found under {}",
                data_dir.display()
            )));
        }

        tracing::info!(
            documents,
            skipped,
            chunks = all_chunks.len(),
            parents = all_parents.len(),
            "corpus split complete, building stores"
        );

        // Embedding is the step most likely to fail mid-run; finish it and
        // the dense rebuild before touching any local artifact so a failed
        // run leaves the previous parent store and snapshot paired.
        let texts: Vec<String> = all_chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        self.dense.rebuild(&all_chunks, &embeddings).await?;

        self.parent_store.put_batch(&all_parents)?;

        let summary = IndexSummary {
            documents,
            skipped,
            chunks: all_chunks.len(),
            parents: all_parents.len(),
        };

        let lexical = LexicalIndex::build(all_chunks);
        lexical.save(&self.lexical_snapshot)?;

        Ok(summary)
    }

    /// Split one document into child chunks (and parents for test methods)
    fn ingest_document(&self, path: &Path) -> Result<(Vec<Chunk>, Vec<ParentChunk>)> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let raw_text = std::fs::read_to_string(path).map_err(|e| RagError::Ingestion {
            document: file_name.clone(),
            reason: e.to_string(),
        })?;

        let category = classify(&file_name);
        let result = match category {
            DocType::ReferenceCode => (self.split_reference_code(&raw_text, &file_name), Vec::new()),
            DocType::TestMethod => self.split_test_method(&raw_text, &file_name),
        };

        if result.0.is_empty() {
            return Err(RagError::Ingestion {
                document: file_name,
                reason: "empty after split".to_string(),
            });
        }

        Ok(result)
    }

    fn split_reference_code(&self, raw_text: &str, file_name: &str) -> Vec<Chunk> {
        split_by_headings(raw_text, CHILD_SPLIT_DEPTH)
            .into_iter()
            .map(|section| Chunk {
                id: Uuid::new_v4().to_string(),
                text: section.text,
                header_path: section.header_path,
                doc_type: DocType::ReferenceCode,
                method_id: UNKNOWN_METHOD_ID.to_string(),
                parent_id: None,
                source: file_name.to_string(),
            })
            .collect()
    }

    fn split_test_method(&self, raw_text: &str, file_name: &str) -> (Vec<Chunk>, Vec<ParentChunk>) {
        let method_id = self
            .method_id_pattern
            .find(file_name)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| UNKNOWN_METHOD_ID.to_string());

        let parents: Vec<ParentChunk> = split_by_headings(raw_text, PARENT_SPLIT_DEPTH)
            .into_iter()
            .map(|section| ParentChunk {
                id: Uuid::new_v4().to_string(),
                text: section.text,
                source: file_name.to_string(),
            })
            .collect();

        let mut chunks = Vec::new();
        for section in split_by_headings(raw_text, CHILD_SPLIT_DEPTH) {
            // A child matching multiple parents is emitted once per match
            for parent in parents.iter().filter(|p| p.text.contains(&section.text)) {
                chunks.push(Chunk {
                    id: Uuid::new_v4().to_string(),
                    text: section.text.clone(),
                    header_path: section.header_path.clone(),
                    doc_type: DocType::TestMethod,
                    method_id: method_id.clone(),
                    parent_id: Some(parent.id.clone()),
                    source: file_name.to_string(),
                });
            }
        }

        (chunks, parents)
    }
}

/// Classify a document from its file name. Anything naming a design code is
/// a reference code; everything else is treated as a test method.
fn classify(file_name: &str) -> DocType {
    if file_name.to_lowercase().contains("code") {
        DocType::ReferenceCode
    } else {
        DocType::TestMethod
    }
}
