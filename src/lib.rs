//! concretebuddy - question answering over concrete-materials standards
//!
//! A local retrieval-augmented service: markdown standards documents are
//! split into parent sections and child chunks, indexed in a dense vector
//! collection and a lexical BM25 snapshot, and queried through a planning
//! agent that routes between hybrid search and metadata-filtered lookup
//! before streaming an answer from a local Ollama model.
//!
//! # Architecture
//!
//! - **index**: document classification, heading-based splitting, and the
//!   offline pipeline that rebuilds every artifact wholesale
//! - **store**: dense (Qdrant), lexical (BM25 snapshot), and parent stores
//! - **retrieval**: reciprocal-rank ensemble and metadata-filtered paths
//! - **rag**: reranking and parent-substitution context assembly
//! - **agent**: per-turn state machine, tool routing, conversation state,
//!   and streamed answer delivery
//! - **providers**: Ollama embedding/chat clients behind trait seams
//! - **service**: configuration-to-pipeline wiring

pub mod agent;
pub mod config;
pub mod errors;
pub mod index;
pub mod providers;
pub mod rag;
pub mod retrieval;
pub mod service;
pub mod store;
pub mod types;

pub use config::Config;
pub use errors::{RagError, Result};
pub use service::{HealthReport, RagService};
pub use types::StreamEvent;
