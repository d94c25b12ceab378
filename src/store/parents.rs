//! Parent document store
//!
//! Flat key-to-record mapping on durable storage: one versioned JSON file
//! per parent id under a single directory. Missing ids are reported as
//! absent, never as errors; the context assembler recovers by using the
//! child chunk's own text.

use crate::errors::{RagError, Result};
use crate::index::ParentChunk;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const RECORD_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ParentRecord {
    version: u32,
    id: String,
    text: String,
    source: String,
}

/// Key→serialized-record store for parent chunks
#[derive(Debug, Clone)]
pub struct ParentStore {
    dir: PathBuf,
}

impl ParentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Verify the store directory exists (serving-time precondition)
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir);
        if !store.dir.is_dir() {
            return Err(RagError::Configuration(format!(
                "parent store directory missing: {}",
                store.dir.display()
            )));
        }
        Ok(store)
    }

    /// Persist a batch of parents, creating the directory if needed
    pub fn put_batch(&self, parents: &[ParentChunk]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        for parent in parents {
            let record = ParentRecord {
                version: RECORD_VERSION,
                id: parent.id.clone(),
                text: parent.text.clone(),
                source: parent.source.clone(),
            };
            let path = self.record_path(&parent.id);
            fs::write(&path, serde_json::to_vec(&record)?)?;
        }

        Ok(())
    }

    /// Fetch a batch of parents by id. Missing or unreadable ids are simply
    /// absent from the result map.
    pub fn get_batch(&self, ids: &[String]) -> HashMap<String, ParentChunk> {
        let mut found = HashMap::new();

        for id in ids {
            match self.read_record(id) {
                Ok(Some(parent)) => {
                    found.insert(id.clone(), parent);
                }
                Ok(None) => {
                    tracing::warn!(parent_id = %id, "parent document missing from store");
                }
                Err(e) => {
                    tracing::warn!(parent_id = %id, error = %e, "unreadable parent record");
                }
            }
        }

        found
    }

    fn read_record(&self, id: &str) -> Result<Option<ParentChunk>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read(&path)?;
        let record: ParentRecord = serde_json::from_slice(&contents)?;

        if record.version != RECORD_VERSION {
            tracing::warn!(
                parent_id = %id,
                version = record.version,
                "parent record version unsupported, treating as missing"
            );
            return Ok(None);
        }

        Ok(Some(ParentChunk {
            id: record.id,
            text: record.text,
            source: record.source,
        }))
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
