//! Offline indexing: document classification, two-tier splitting, linking
//!
//! Documents are split twice: a coarse pass over top-level headings produces
//! parent chunks (returned at answer time for context sufficiency), a fine
//! pass over heading levels 1-5 produces child chunks (indexed for
//! precision). Children are linked to the parent whose text contains them.

pub mod builder;
pub mod splitter;

pub use builder::{IndexBuilder, IndexSummary};

use serde::{Deserialize, Serialize};

/// Document category, derived from the source file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocType {
    /// Reference design code (e.g. the Hong Kong concrete code)
    ReferenceCode,

    /// Standard test method (e.g. ASTM C109)
    TestMethod,
}

impl DocType {
    /// Metadata value used in the dense index and the tool filter schema
    pub fn wire_name(&self) -> &'static str {
        match self {
            DocType::ReferenceCode => "HK Code",
            DocType::TestMethod => "ASTM Test",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "HK Code" => Some(DocType::ReferenceCode),
            "ASTM Test" => Some(DocType::TestMethod),
            _ => None,
        }
    }
}

/// A child chunk: the retrieval unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Generated unique identifier
    pub id: String,

    pub text: String,

    /// Heading hierarchy captured at split time, outermost first
    pub header_path: Vec<String>,

    pub doc_type: DocType,

    /// Extracted method code (e.g. "c109"), or "unknown"
    pub method_id: String,

    /// Link to the enclosing parent chunk. Present only for TestMethod
    /// documents; ReferenceCode chunks never carry one.
    pub parent_id: Option<String>,

    /// Source file name
    pub source: String,
}

/// A parent chunk: a top-level section returned in place of its children
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentChunk {
    pub id: String,
    pub text: String,
    pub source: String,
}

/// Fallback value for a missing method identifier
pub const UNKNOWN_METHOD_ID: &str = "unknown";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_name_roundtrip() {
        for doc_type in [DocType::ReferenceCode, DocType::TestMethod] {
            assert_eq!(DocType::from_wire(doc_type.wire_name()), Some(doc_type));
        }
        assert_eq!(DocType::from_wire("Eurocode"), None);
    }
}
