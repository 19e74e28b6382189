//! Vector index using usearch (HNSW algorithm)
//!
//! Approximate nearest neighbor search over description embeddings,
//! keyed by snippet ID. Uses cosine similarity. Membership follows the
//! store invariant: a key is present iff the snippet is public and has
//! a description.

use crate::error::{Result, SearchError};
use std::path::Path;
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

/// A single nearest-neighbor hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    /// Snippet ID the embedding belongs to
    pub id: u64,
    /// Similarity score (0.0 to 1.0, higher is better)
    pub score: f32,
}

/// Vector index over description embeddings
pub struct VectorIndex {
    index: Index,
    dimension: usize,
}

impl VectorIndex {
    fn options(dimension: usize) -> IndexOptions {
        IndexOptions {
            dimensions: dimension,
            metric: MetricKind::Cos, // Cosine similarity
            quantization: ScalarKind::F32,
            connectivity: 16,       // M parameter for HNSW
            expansion_add: 128,     // ef_construction
            expansion_search: 64,   // ef
            multi: false,
        }
    }

    /// Create a new empty index
    pub fn new(dimension: usize) -> Result<Self> {
        let index =
            Index::new(&Self::options(dimension)).map_err(|e| SearchError::Index(e.to_string()))?;
        Ok(Self { index, dimension })
    }

    /// Load an existing index from disk
    pub fn load(path: &Path, dimension: usize) -> Result<Self> {
        if !path.exists() {
            return Err(SearchError::NoCatalog);
        }

        let me = Self::new(dimension)?;
        let path_str = path
            .to_str()
            .ok_or_else(|| SearchError::Index(format!("non-utf8 index path: {:?}", path)))?;
        me.index
            .load(path_str)
            .map_err(|e| SearchError::Index(e.to_string()))?;

        info!("Loaded {} vectors from {:?}", me.index.size(), path);
        Ok(me)
    }

    /// Save the index to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| SearchError::Index(format!("non-utf8 index path: {:?}", path)))?;
        self.index
            .save(path_str)
            .map_err(|e| SearchError::Index(e.to_string()))?;
        debug!("Saved {} vectors to {:?}", self.index.size(), path);
        Ok(())
    }

    /// Embedding vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// Whether the index holds no vectors
    pub fn is_empty(&self) -> bool {
        self.index.size() == 0
    }

    /// Insert or replace the embedding for a snippet
    pub fn upsert(&mut self, id: u64, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(SearchError::Index(format!(
                "embedding dimension {} does not match index dimension {}",
                embedding.len(),
                self.dimension
            )));
        }

        // Replace semantics; missing keys are fine
        let _ = self.index.remove(id);

        self.index
            .reserve(self.index.size() + 1)
            .map_err(|e| SearchError::Index(e.to_string()))?;
        self.index
            .add(id, embedding)
            .map_err(|e| SearchError::Index(e.to_string()))?;

        debug!("Upserted embedding for snippet {}", id);
        Ok(())
    }

    /// Remove a snippet's embedding, if present
    pub fn remove(&mut self, id: u64) {
        let _ = self.index.remove(id);
    }

    /// Top-k most similar snippets, highest score first. Ties are
    /// broken by ascending snippet ID so results are stable.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        if self.index.size() == 0 || top_k == 0 {
            return Ok(vec![]);
        }

        let results = self
            .index
            .search(query_embedding, top_k)
            .map_err(|e| SearchError::Index(e.to_string()))?;

        let mut hits: Vec<VectorHit> = results
            .keys
            .iter()
            .zip(results.distances.iter())
            .map(|(key, distance)| VectorHit {
                id: *key,
                // Convert cosine distance to similarity
                score: 1.0 - distance,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dir: usize, dimension: usize) -> Vec<f32> {
        let mut v = vec![0.0; dimension];
        v[dir] = 1.0;
        v
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = VectorIndex::new(4).unwrap();
        assert!(index.search(&unit(0, 4), 5).unwrap().is_empty());
    }

    #[test]
    fn test_nearest_neighbor_ordering() {
        let mut index = VectorIndex::new(4).unwrap();
        index.upsert(1, &unit(0, 4)).unwrap();
        index.upsert(2, &unit(1, 4)).unwrap();
        index.upsert(3, &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let hits = index.search(&unit(0, 4), 3).unwrap();
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[1].id, 3);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_ties_break_by_id() {
        let mut index = VectorIndex::new(4).unwrap();
        index.upsert(7, &unit(2, 4)).unwrap();
        index.upsert(3, &unit(2, 4)).unwrap();

        let hits = index.search(&unit(2, 4), 2).unwrap();
        assert_eq!(hits[0].id, 3);
        assert_eq!(hits[1].id, 7);
    }

    #[test]
    fn test_upsert_replaces() {
        let mut index = VectorIndex::new(4).unwrap();
        index.upsert(1, &unit(0, 4)).unwrap();
        index.upsert(1, &unit(1, 4)).unwrap();
        assert_eq!(index.len(), 1);

        let hits = index.search(&unit(1, 4), 1).unwrap();
        assert_eq!(hits[0].id, 1);
        assert!(hits[0].score > 0.9);
    }

    #[test]
    fn test_remove() {
        let mut index = VectorIndex::new(4).unwrap();
        index.upsert(1, &unit(0, 4)).unwrap();
        index.remove(1);
        assert!(index.is_empty());
        // Removing a missing key is a no-op
        index.remove(99);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = VectorIndex::new(4).unwrap();
        assert!(index.upsert(1, &[1.0, 0.0]).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.usearch");

        let mut index = VectorIndex::new(4).unwrap();
        index.upsert(1, &unit(0, 4)).unwrap();
        index.upsert(2, &unit(1, 4)).unwrap();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path, 4).unwrap();
        assert_eq!(loaded.len(), 2);
        let hits = loaded.search(&unit(0, 4), 1).unwrap();
        assert_eq!(hits[0].id, 1);
    }
}
