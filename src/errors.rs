//! Error types for the concretebuddy RAG service
//!
//! One enum covers the whole pipeline. The variants map to how a failure is
//! handled: configuration errors are fatal at startup, ingestion errors skip
//! a single document, provider errors terminate the current turn, and lookup
//! misses are recovered locally by the context assembler.

use thiserror::Error;

/// Main error type for the RAG service
#[derive(Error, Debug)]
pub enum RagError {
    /// Missing or invalid provider endpoints, paths, or index artifacts.
    /// Fatal at startup; the service reports unhealthy.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single document could not be ingested. Skipped and logged,
    /// never fatal to the indexing run.
    #[error("Ingestion failed for {document}: {reason}")]
    Ingestion { document: String, reason: String },

    /// An embedding, rerank, or generation call failed. Terminates the
    /// current turn only; surfaced to the caller as an error fragment.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Turn state machine violation
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Streaming delivery errors
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RAG service operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Whether this error aborts service startup rather than a single turn
    pub fn is_fatal(&self) -> bool {
        matches!(self, RagError::Configuration(_))
    }
}
