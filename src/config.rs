//! Configuration types and constants for snipsearch
//!
//! Defines embedding models, catalog paths, and the result caps used by
//! the search pipeline.

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported embedding models (all run locally via ONNX)
///
/// These models are downloaded on first use and cached locally.
/// No API keys or network access required after initial download.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum EmbeddingModel {
    /// Fast, small model (384 dims, ~30MB) - good for most use cases
    #[default]
    AllMiniLmL6V2,
    /// Higher quality (384 dims, ~90MB) - better semantic understanding
    BgeSmallEnV15,
    /// Best quality for code (768 dims, ~90MB)
    NomicEmbedTextV15,
    /// Multilingual support (384 dims, ~470MB)
    MultilingualE5Small,
}

impl EmbeddingModel {
    /// Get the HuggingFace model identifier
    pub fn model_name(&self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            Self::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
            Self::NomicEmbedTextV15 => "nomic-ai/nomic-embed-text-v1.5",
            Self::MultilingualE5Small => "intfloat/multilingual-e5-small",
        }
    }

    /// Get the embedding vector dimension
    pub fn dimension(&self) -> usize {
        match self {
            Self::AllMiniLmL6V2 => 384,
            Self::BgeSmallEnV15 => 384,
            Self::NomicEmbedTextV15 => 768,
            Self::MultilingualE5Small => 384,
        }
    }
}

impl std::str::FromStr for EmbeddingModel {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "minilm" | "all-minilm-l6-v2" | "default" => Ok(Self::AllMiniLmL6V2),
            "bge" | "bge-small" | "bge-small-en-v1.5" => Ok(Self::BgeSmallEnV15),
            "nomic" | "nomic-embed" | "nomic-embed-text-v1.5" => Ok(Self::NomicEmbedTextV15),
            "multilingual" | "e5" | "multilingual-e5-small" => Ok(Self::MultilingualE5Small),
            _ => Err(SearchError::Config(format!(
                "Unknown model: {}. Valid options: minilm, bge, nomic, multilingual",
                s
            ))),
        }
    }
}

/// Configuration for the snippet catalog and search pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the catalog (store snapshot, vectors, config)
    pub data_dir: PathBuf,
    /// Embedding model used for description embeddings
    pub model: EmbeddingModel,
    /// Result cap for structured/lexical search
    pub search_cap: usize,
    /// Combined result cap for smart search
    pub smart_cap: usize,
    /// Slots within `smart_cap` reserved for name matches
    pub smart_name_slots: usize,
    /// Queries longer than this are truncated, not rejected
    pub max_query_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".snipsearch"),
            model: EmbeddingModel::default(),
            search_cap: 50,
            smart_cap: 35,
            smart_name_slots: 30,
            max_query_len: 300,
        }
    }
}

impl Config {
    /// Create a new config storing its catalog under the given directory
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Set the embedding model
    pub fn with_model(mut self, model: EmbeddingModel) -> Self {
        self.model = model;
        self
    }

    /// Set the lexical search result cap
    pub fn with_search_cap(mut self, cap: usize) -> Self {
        self.search_cap = cap;
        self
    }

    /// Get path to the vector index file
    pub fn vectors_path(&self) -> PathBuf {
        self.data_dir.join("vectors.usearch")
    }

    /// Get path to the store snapshot file
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.bin")
    }

    /// Get path to the config file
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(self.config_path(), json)?;
        Ok(())
    }

    /// Load configuration from disk
    pub fn load(data_dir: &PathBuf) -> Result<Self> {
        let config_path = data_dir.join("config.json");
        if !config_path.exists() {
            return Err(SearchError::NoCatalog);
        }
        let json = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&json)?;
        Ok(config)
    }
}
