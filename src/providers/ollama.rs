//! Ollama API client
//!
//! Implements the embedding and generation provider interfaces over a local
//! Ollama instance:
//! - POST /api/embeddings for dense vectors
//! - POST /api/chat for planning (non-streamed, with tool capability) and
//!   answer generation (line-delimited JSON stream)

use crate::config::OllamaConfig;
use crate::errors::{RagError, Result};
use crate::providers::{ChatModel, Embedder, PlannerReply, ToolSpec};
use crate::types::{ChatMessage, ChatRole, ToolInvocation};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Request timeout. Generation streams longer than this are fine; the
/// timeout applies per connection attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Capacity of the fragment channel between the HTTP stream reader and the
/// consumer. Bounded for backpressure.
const FRAGMENT_CHANNEL_CAPACITY: usize = 32;

/// Embedding dimensions for the default embedding model (nomic-embed-text)
const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Ollama provider for embeddings and chat generation
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    embedding_model: String,
    embedding_dim: usize,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        })
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/version", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat_request(&self, request: &OllamaChatRequest) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| RagError::Provider(format!("chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RagError::Provider(format!(
                "Ollama chat HTTP {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl Embedder for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = OllamaEmbeddingRequest {
            model: self.embedding_model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Provider(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Provider(format!(
                "Ollama embeddings HTTP {}",
                response.status()
            )));
        }

        let body: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Provider(format!("invalid embedding response: {}", e)))?;

        Ok(body.embedding.into_iter().map(|v| v as f32).collect())
    }

    fn dimensions(&self) -> usize {
        self.embedding_dim
    }
}

#[async_trait]
impl ChatModel for OllamaProvider {
    async fn plan(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<PlannerReply> {
        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(to_wire_message).collect(),
            stream: false,
            tools: tools.iter().map(to_wire_tool).collect(),
        };

        let response = self.chat_request(&request).await?;

        let body: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::Provider(format!("invalid chat response: {}", e)))?;

        let message = body
            .message
            .ok_or_else(|| RagError::Provider("chat response missing message".to_string()))?;

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| ToolInvocation {
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(PlannerReply {
            content: message.content,
            tool_calls,
        })
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<Result<String>>> {
        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(to_wire_message).collect(),
            stream: true,
            tools: Vec::new(),
        };

        let response = self.chat_request(&request).await?;

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let mut byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(RagError::Streaming(e.to_string()))).await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                // Ollama streams one JSON object per line
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<OllamaChatResponse>(line) {
                        Ok(parsed) => {
                            if let Some(message) = parsed.message {
                                if !message.content.is_empty()
                                    && tx.send(Ok(message.content)).await.is_err()
                                {
                                    // Consumer stopped listening; abandon the stream
                                    return;
                                }
                            }
                            if parsed.done {
                                return;
                            }
                        }
                        Err(e) => {
                            let _ = tx
                                .send(Err(RagError::Streaming(format!(
                                    "malformed stream line: {}",
                                    e
                                ))))
                                .await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

fn to_wire_message(message: &ChatMessage) -> OllamaWireMessage {
    let role = match message.role {
        ChatRole::System => "system",
        ChatRole::Human => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    };

    OllamaWireMessage {
        role: role.to_string(),
        content: message.content.clone(),
    }
}

fn to_wire_tool(spec: &ToolSpec) -> OllamaWireTool {
    OllamaWireTool {
        tool_type: "function".to_string(),
        function: OllamaWireToolFunction {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        },
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaWireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaWireTool>,
}

#[derive(Debug, Serialize)]
struct OllamaWireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaWireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OllamaWireToolFunction,
}

#[derive(Debug, Serialize)]
struct OllamaWireToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCallFunction {
    name: String,
    arguments: serde_json::Value,
}
