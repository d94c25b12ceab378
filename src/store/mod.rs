//! Chunk and parent document stores
//!
//! All stores are rebuilt wholesale during indexing and read-only during
//! serving. The lexical index and parent store use explicit versioned JSON
//! records so the artifacts can be rebuilt or migrated without coupling to
//! an opaque serialization mechanism.

pub mod lexical;
pub mod parents;
pub mod vector;

pub use lexical::LexicalIndex;
pub use parents::ParentStore;
pub use vector::{DenseIndex, MetadataFilter, QdrantIndex};
