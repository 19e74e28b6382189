//! Custom error types for snipsearch
//!
//! Uses thiserror for ergonomic error definitions with automatic
//! Display and Error trait implementations.

use thiserror::Error;

/// Application-specific errors for snipsearch
#[derive(Error, Debug)]
pub enum SearchError {
    /// IO operations failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding model failed to load or embed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index operations failed
    #[error("Index error: {0}")]
    Index(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON parsing failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No catalog exists at the expected location
    #[error("No catalog found. Run `snipsearch import` first.")]
    NoCatalog,

    /// Semantic search cannot run because the embedding provider is down.
    /// Lexical search is unaffected.
    #[error("Smart search unavailable: {0}")]
    SearchUnavailable(String),

    /// A datastore read failed mid-query; the whole result is aborted.
    /// Callers should treat this as transient and retryable.
    #[error("Search failed: {0}")]
    SearchFailed(String),

    /// Referenced user or snippet does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input exceeded a documented limit or was otherwise malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SearchError>;
