//! Lexical keyword index (BM25)
//!
//! In-process index over the full child-chunk corpus, persisted as a single
//! versioned JSON snapshot and rebuilt wholesale on each indexing run. The
//! snapshot only carries the chunks themselves; the scoring engine is rebuilt
//! from them on load.

use crate::errors::{RagError, Result};
use crate::index::Chunk;
use bm25::{Document, Language, SearchEngineBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const SNAPSHOT_VERSION: u32 = 1;

/// Serialized snapshot format
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    chunks: Vec<Chunk>,
}

/// BM25 index over the child-chunk corpus. Engine document ids are positions
/// in `chunks`.
#[derive(Debug)]
pub struct LexicalIndex {
    chunks: Vec<Chunk>,
    engine: bm25::SearchEngine<u32>,
}

impl LexicalIndex {
    /// Build the index over a chunk corpus
    pub fn build(chunks: Vec<Chunk>) -> Self {
        let documents: Vec<Document<u32>> = chunks
            .iter()
            .enumerate()
            .map(|(idx, chunk)| Document {
                id: idx as u32,
                contents: chunk.text.clone(),
            })
            .collect();

        let engine =
            SearchEngineBuilder::<u32>::with_documents(Language::English, documents).build();

        Self { chunks, engine }
    }

    /// Top-k chunks by BM25 score, best first. Chunks sharing no terms with
    /// the query are never returned.
    pub fn search(&self, query: &str, k: usize) -> Vec<(Chunk, f64)> {
        self.engine
            .search(query, k)
            .into_iter()
            .filter(|result| result.score > 0.0)
            .map(|result| {
                (
                    self.chunks[result.document.id as usize].clone(),
                    result.score as f64,
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Write the snapshot file, replacing any previous one
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            chunks: self.chunks.clone(),
        };

        fs::write(path, serde_json::to_vec(&snapshot)?)?;
        Ok(())
    }

    /// Load a snapshot file and rebuild the scoring engine from it
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read(path).map_err(|e| {
            RagError::Configuration(format!(
                "lexical index snapshot not readable at {}: {}",
                path.display(),
                e
            ))
        })?;

        let snapshot: Snapshot = serde_json::from_slice(&contents)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RagError::Configuration(format!(
                "lexical snapshot version {} unsupported (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        Ok(Self::build(snapshot.chunks))
    }
}
