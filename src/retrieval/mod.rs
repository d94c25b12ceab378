//! Online retrieval
//!
//! Two retrieval paths feed the context assembler. The ensemble retriever
//! fuses lexical and dense rankings with reciprocal-rank fusion and serves
//! general questions; the filtered retriever constrains the dense index by
//! document metadata and serves identifier-targeted lookups.

pub mod ensemble;
pub mod filtered;

pub use ensemble::EnsembleRetriever;
pub use filtered::FilteredRetriever;

use crate::index::Chunk;

/// Which retrieval path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalSource {
    Lexical,
    Dense,
    MetadataFiltered,
}

/// A retrieved chunk with its path-specific relevance score
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f64,
    pub source: RetrievalSource,
}
