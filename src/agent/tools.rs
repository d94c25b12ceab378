//! Retrieval tools exposed to the planner
//!
//! The planner sees two tools. Their descriptions carry the routing policy:
//! identifier-targeted lookups go through the metadata-filtered path, and
//! everything else goes through the hybrid ensemble.

use crate::errors::{RagError, Result};
use crate::providers::ToolSpec;
use crate::store::MetadataFilter;
use crate::types::ToolInvocation;
use serde::Deserialize;
use serde_json::json;

pub const IDENTIFIER_SEARCH: &str = "identifier_search";
pub const GENERAL_SEARCH: &str = "general_search";

/// A planner-requested retrieval, one variant per tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalTool {
    /// Metadata-filtered lookup for queries naming a specific document
    IdentifierSearch {
        query: String,
        doc_type: Option<String>,
        method_id: Option<String>,
    },

    /// Hybrid lexical + dense search for general technical questions
    GeneralSearch { query: String },
}

#[derive(Deserialize)]
struct IdentifierArgs {
    query: String,
    doc_type: Option<String>,
    method_id: Option<String>,
}

#[derive(Deserialize)]
struct GeneralArgs {
    query: String,
}

impl RetrievalTool {
    /// Tool declarations sent to the planner
    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: IDENTIFIER_SEARCH.to_string(),
                description: "Use this tool ONLY when the user's query explicitly mentions a \
                              specific test method ID (e.g., 'C157', 'ASTM C109', 'c109') or a \
                              specific document such as a design code. Filters the document \
                              collection by the identified metadata before searching."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The user's question, rephrased as a search query"
                        },
                        "doc_type": {
                            "type": "string",
                            "enum": ["ASTM Test", "HK Code"],
                            "description": "Document class to restrict the search to"
                        },
                        "method_id": {
                            "type": "string",
                            "description": "Test method ID mentioned in the query, e.g. 'c109'"
                        }
                    },
                    "required": ["query"]
                }),
            },
            ToolSpec {
                name: GENERAL_SEARCH.to_string(),
                description: "Use this tool for technical questions about concrete materials, \
                              testing procedures, or design requirements when NO specific \
                              method ID or document is mentioned."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The user's question, rephrased as a search query"
                        }
                    },
                    "required": ["query"]
                }),
            },
        ]
    }

    /// Decode a planner tool call. Unknown tool names and malformed
    /// arguments are provider errors; the model produced them.
    pub fn from_invocation(invocation: &ToolInvocation) -> Result<Self> {
        match invocation.name.as_str() {
            IDENTIFIER_SEARCH => {
                let args: IdentifierArgs = serde_json::from_value(invocation.arguments.clone())
                    .map_err(|e| {
                        RagError::Provider(format!("malformed {} arguments: {}", IDENTIFIER_SEARCH, e))
                    })?;
                Ok(RetrievalTool::IdentifierSearch {
                    query: args.query,
                    doc_type: args.doc_type,
                    // Stored method ids are lowercase
                    method_id: args.method_id.map(|m| m.to_lowercase()),
                })
            }
            GENERAL_SEARCH => {
                let args: GeneralArgs = serde_json::from_value(invocation.arguments.clone())
                    .map_err(|e| {
                        RagError::Provider(format!("malformed {} arguments: {}", GENERAL_SEARCH, e))
                    })?;
                Ok(RetrievalTool::GeneralSearch { query: args.query })
            }
            other => Err(RagError::Provider(format!(
                "planner requested unknown tool: {}",
                other
            ))),
        }
    }

    pub fn query(&self) -> &str {
        match self {
            RetrievalTool::IdentifierSearch { query, .. } => query,
            RetrievalTool::GeneralSearch { query } => query,
        }
    }

    /// Metadata constraints for the filtered path; empty for general search
    pub fn filter(&self) -> MetadataFilter {
        match self {
            RetrievalTool::IdentifierSearch {
                doc_type,
                method_id,
                ..
            } => MetadataFilter {
                doc_type: doc_type.clone(),
                method_id: method_id.clone(),
            },
            RetrievalTool::GeneralSearch { .. } => MetadataFilter::default(),
        }
    }
}
