use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Service configuration, loaded from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama base URL
    pub base_url: String,

    /// Chat/generation model
    pub model: String,

    /// Embedding model
    pub embedding_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of raw standards documents (markdown)
    pub data_dir: PathBuf,

    /// Lexical index snapshot file
    pub lexical_snapshot: PathBuf,

    /// Parent document store directory
    pub parent_store: PathBuf,

    /// Qdrant endpoint for the dense chunk index
    pub qdrant_url: String,

    /// Qdrant collection name
    pub collection: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/literature"),
            lexical_snapshot: PathBuf::from("data/lexical_index.json"),
            parent_store: PathBuf::from("data/parent_store"),
            qdrant_url: "http://127.0.0.1:6334".to_string(),
            collection: "standards_chunks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Top-k for the lexical retriever
    pub lexical_k: usize,

    /// Top-k for the dense retriever
    pub dense_k: usize,

    /// Fusion weights (lexical, dense)
    pub lexical_weight: f64,
    pub dense_weight: f64,

    /// Documents kept after reranking
    pub rerank_top_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_k: 5,
            dense_k: 5,
            lexical_weight: 0.5,
            dense_weight: 0.5,
            rerank_top_n: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            paths: PathsConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating a default one if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| RagError::Configuration(format!("invalid config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RagError::Configuration(format!("failed to serialize config: {}", e)))?;

        fs::write(&config_path, toml_string)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RagError::Configuration("could not determine home directory".into()))?;

        Ok(home.join(".concretebuddy").join("config.toml"))
    }
}
