//! LLM-prompted relevance reranker
//!
//! Scores (query, text) pairs by asking the chat model for a JSON array of
//! scores. Malformed model output falls back to a neutral score per document
//! so a flaky reranker degrades ranking quality instead of failing the turn.

use crate::errors::Result;
use crate::providers::{ChatModel, Reranker};
use crate::types::ChatMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// Characters of each document shown to the scoring prompt
const SNIPPET_LEN: usize = 400;

/// Score assigned when the model's output cannot be parsed
const NEUTRAL_SCORE: f64 = 0.5;

pub struct PromptReranker {
    model: Arc<dyn ChatModel>,
}

impl PromptReranker {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    fn build_prompt(query: &str, texts: &[String]) -> String {
        let mut prompt = format!("Q: \"{}\"\nDocs:\n", query);

        for (idx, text) in texts.iter().enumerate() {
            let snippet: String = text.chars().take(SNIPPET_LEN).collect();
            prompt.push_str(&format!("[{}] {}\n", idx, snippet));
        }

        prompt.push_str("\nScore each doc 0-1 for relevance. Output ONLY JSON: {\"scores\":[0.0,...]}\n");
        prompt
    }
}

#[async_trait]
impl Reranker for PromptReranker {
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f64>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let messages = vec![
            ChatMessage::system(
                "Score document relevance to the query. Output ONLY JSON: {\"scores\": [0.0-1.0, ...]}",
            ),
            ChatMessage::human(Self::build_prompt(query, texts)),
        ];

        let reply = self.model.plan(&messages, &[]).await?;

        Ok(parse_scores(&reply.content, texts.len()))
    }
}

/// Extract an aligned score vector from the model output, padding or
/// defaulting when the JSON is missing or short.
fn parse_scores(response: &str, expected: usize) -> Vec<f64> {
    let json_str = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => return vec![NEUTRAL_SCORE; expected],
    };

    let parsed: serde_json::Value = match serde_json::from_str(json_str) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse reranker scores, using neutral fallback");
            return vec![NEUTRAL_SCORE; expected];
        }
    };

    match parsed["scores"].as_array() {
        Some(arr) => (0..expected)
            .map(|idx| arr.get(idx).and_then(|v| v.as_f64()).unwrap_or(NEUTRAL_SCORE))
            .collect(),
        None => vec![NEUTRAL_SCORE; expected],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_valid() {
        let scores = parse_scores(r#"{"scores":[0.9,0.2,0.7]}"#, 3);
        assert_eq!(scores, vec![0.9, 0.2, 0.7]);
    }

    #[test]
    fn test_parse_scores_with_surrounding_text() {
        let scores = parse_scores("Here you go: {\"scores\":[1.0,0.0]} done", 2);
        assert_eq!(scores, vec![1.0, 0.0]);
    }

    #[test]
    fn test_parse_scores_malformed_falls_back() {
        let scores = parse_scores("not json at all", 2);
        assert_eq!(scores, vec![NEUTRAL_SCORE, NEUTRAL_SCORE]);
    }

    #[test]
    fn test_parse_scores_short_array_padded() {
        let scores = parse_scores(r#"{"scores":[0.8]}"#, 3);
        assert_eq!(scores, vec![0.8, NEUTRAL_SCORE, NEUTRAL_SCORE]);
    }

    #[test]
    fn test_build_prompt_truncates() {
        let long = "x".repeat(2000);
        let prompt = PromptReranker::build_prompt("q", &[long]);
        assert!(prompt.len() < 1000);
    }
}
