//! Local embedding generation using fastembed (ONNX runtime)
//!
//! Generates embeddings entirely locally - no API calls required.
//! Models are downloaded once and cached in ~/.cache/huggingface/
//!
//! The engine takes the provider as an explicit `&dyn Embedder`
//! dependency. The fastembed implementation defers the expensive model
//! load to first use, guarded so concurrent first calls cannot
//! double-initialize.

use crate::config::EmbeddingModel;
use crate::error::{Result, SearchError};
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use std::sync::{Mutex, OnceLock};
use tracing::info;

/// A text-to-vector provider. Implementations must produce vectors of a
/// fixed dimension, suitable for cosine similarity.
pub trait Embedder: Send + Sync {
    /// The embedding vector dimension
    fn dimension(&self) -> usize;

    /// Embed a single text string
    fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts in a single batch (more efficient)
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

/// Local embedder using fastembed with ONNX runtime
///
/// Construction is cheap; the model loads on first embed. On first use
/// the model is downloaded from HuggingFace (~30-470MB), subsequent
/// uses load from cache.
pub struct FastembedEmbedder {
    model_config: EmbeddingModel,
    dimension: usize,
    model: OnceLock<TextEmbedding>,
    init_lock: Mutex<()>,
}

impl FastembedEmbedder {
    /// Create an embedder for the specified model without loading it
    pub fn new(model_config: EmbeddingModel) -> Self {
        let dimension = model_config.dimension();
        Self {
            model_config,
            dimension,
            model: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Force model initialization now instead of on first embed
    pub fn preload(&self) -> Result<()> {
        self.model().map(|_| ())
    }

    fn model(&self) -> Result<&TextEmbedding> {
        if let Some(model) = self.model.get() {
            return Ok(model);
        }

        // One initialization at a time; losers of the race find the
        // model already set.
        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| SearchError::Embedding("embedder init lock poisoned".to_string()))?;

        if self.model.get().is_none() {
            info!("Loading embedding model: {:?}", self.model_config);

            let fastembed_model = match self.model_config {
                EmbeddingModel::AllMiniLmL6V2 => FastEmbedModel::AllMiniLML6V2,
                EmbeddingModel::BgeSmallEnV15 => FastEmbedModel::BGESmallENV15,
                EmbeddingModel::NomicEmbedTextV15 => FastEmbedModel::NomicEmbedTextV15,
                EmbeddingModel::MultilingualE5Small => FastEmbedModel::MultilingualE5Small,
            };

            let model = TextEmbedding::try_new(
                InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
            .map_err(|e| SearchError::Embedding(e.to_string()))?;

            let _ = self.model.set(model);
            info!("Model loaded successfully (dimension: {})", self.dimension);
        }

        self.model
            .get()
            .ok_or_else(|| SearchError::Embedding("model missing after init".to_string()))
    }
}

impl Embedder for FastembedEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self
            .model()?
            .embed(vec![text], None)
            .map_err(|e| SearchError::Embedding(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("No embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.model()?
            .embed(refs, None)
            .map_err(|e| SearchError::Embedding(e.to_string()))
    }
}

/// Normalize embedding vector to unit length (for cosine similarity)
pub fn normalize(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in embedding.iter_mut() {
            *x /= norm;
        }
    }
}

/// Compute cosine similarity between two normalized vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Deterministic token-hashing embedder for tests. Texts sharing words
/// map to nearby vectors; no model download involved.
#[cfg(test)]
pub(crate) struct StubEmbedder {
    pub dimension: usize,
    /// When set, every embed call fails; simulates a dead provider
    pub fail: bool,
}

#[cfg(test)]
impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: 16,
            fail: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            dimension: 16,
            fail: true,
        }
    }
}

#[cfg(test)]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(SearchError::Embedding("stub embedder disabled".to_string()));
        }
        let mut v = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            v[(hash % self.dimension as u64) as usize] += 1.0;
        }
        normalize(&mut v);
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let c = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
    }

    #[test]
    fn test_stub_embedder_deterministic() {
        let stub = StubEmbedder::new();
        let a = stub.embed_one("sorting a linked list").unwrap();
        let b = stub.embed_one("sorting a linked list").unwrap();
        assert_eq!(a, b);

        let unrelated = stub.embed_one("regex capture groups").unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &unrelated));
    }

    #[test]
    fn test_broken_stub_fails() {
        let stub = StubEmbedder::broken();
        assert!(stub.embed_one("anything").is_err());
    }
}
