//! Snippet lifecycle and embedding maintenance
//!
//! Applies creates, edits, deletions, and visibility changes to the
//! store and the vector index together, holding the invariant that an
//! embedding exists iff the snippet is public and has a description.
//!
//! Edits replace tags and permission grants wholesale. The description
//! embedding is regenerated only when the description text actually
//! changed, tracked by a SHA-256 content hash; a private->public
//! transition backfills the embedding immediately.

use crate::embedder::Embedder;
use crate::error::{Result, SearchError};
use crate::snippet::{
    Snippet, MAX_CODE_LEN, MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_TAG_COUNT, MAX_TAG_LEN,
};
use crate::store::SnippetStore;
use crate::vector::VectorIndex;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Fields for a new snippet
#[derive(Debug, Clone)]
pub struct NewSnippet {
    pub name: String,
    pub code: String,
    pub description: String,
    pub owner_id: u64,
    pub parent_id: Option<u64>,
    pub is_public: bool,
    pub tags: BTreeSet<String>,
    /// Users granted access when the snippet is private
    pub permitted_users: BTreeSet<u64>,
}

/// Fields replaced by an edit. Owner, lineage, and creation time are
/// immutable.
#[derive(Debug, Clone)]
pub struct SnippetPatch {
    pub name: String,
    pub code: String,
    pub description: String,
    pub is_public: bool,
    pub tags: BTreeSet<String>,
    pub permitted_users: BTreeSet<u64>,
}

/// Applies snippet mutations, keeping store and vectors in sync
pub struct Indexer<'a> {
    embedder: &'a dyn Embedder,
}

impl<'a> Indexer<'a> {
    /// Create an indexer around an embedding provider
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder }
    }

    /// Create a snippet, returning its ID
    pub fn create_snippet(
        &self,
        store: &mut SnippetStore,
        vectors: &mut VectorIndex,
        new: NewSnippet,
    ) -> Result<u64> {
        validate_fields(&new.name, &new.code, &new.description)?;
        validate_tags(&new.tags)?;
        if !store.user_exists(new.owner_id) {
            return Err(SearchError::NotFound(format!("user {}", new.owner_id)));
        }
        if let Some(parent) = new.parent_id {
            if store.snippet(parent).is_none() {
                return Err(SearchError::NotFound(format!("parent snippet {}", parent)));
            }
        }

        let id = store.allocate_snippet_id();
        store.put_snippet(Snippet {
            id,
            name: new.name,
            code: new.code,
            description: new.description,
            owner_id: new.owner_id,
            parent_id: new.parent_id,
            created_at: Utc::now(),
            is_public: new.is_public,
            description_hash: None,
        });
        store.set_tags(id, new.tags)?;
        store.set_grants(id, &new.permitted_users);

        self.sync_embedding(store, vectors, id)?;
        info!("Created snippet {}", id);
        Ok(id)
    }

    /// Edit a snippet: full replace of fields, tags, and grants
    pub fn update_snippet(
        &self,
        store: &mut SnippetStore,
        vectors: &mut VectorIndex,
        id: u64,
        patch: SnippetPatch,
    ) -> Result<()> {
        validate_fields(&patch.name, &patch.code, &patch.description)?;
        validate_tags(&patch.tags)?;
        let existing = store
            .snippet(id)
            .cloned()
            .ok_or_else(|| SearchError::NotFound(format!("snippet {}", id)))?;

        store.put_snippet(Snippet {
            id,
            name: patch.name,
            code: patch.code,
            description: patch.description,
            owner_id: existing.owner_id,
            parent_id: existing.parent_id,
            created_at: existing.created_at,
            is_public: patch.is_public,
            description_hash: existing.description_hash,
        });
        store.set_tags(id, patch.tags)?;
        store.set_grants(id, &patch.permitted_users);

        self.sync_embedding(store, vectors, id)?;
        debug!("Updated snippet {}", id);
        Ok(())
    }

    /// Toggle a snippet's visibility. Becoming public clears grants and
    /// backfills the embedding; becoming private removes it.
    pub fn set_visibility(
        &self,
        store: &mut SnippetStore,
        vectors: &mut VectorIndex,
        id: u64,
        is_public: bool,
    ) -> Result<()> {
        let mut snippet = store
            .snippet(id)
            .cloned()
            .ok_or_else(|| SearchError::NotFound(format!("snippet {}", id)))?;
        if snippet.is_public == is_public {
            return Ok(());
        }

        snippet.is_public = is_public;
        store.put_snippet(snippet);
        if is_public {
            store.set_grants(id, &BTreeSet::new());
        }

        self.sync_embedding(store, vectors, id)?;
        debug!("Set snippet {} visibility to public={}", id, is_public);
        Ok(())
    }

    /// Delete a snippet and everything attached to it
    pub fn delete_snippet(
        &self,
        store: &mut SnippetStore,
        vectors: &mut VectorIndex,
        id: u64,
    ) -> Result<()> {
        store
            .remove_snippet(id)
            .ok_or_else(|| SearchError::NotFound(format!("snippet {}", id)))?;
        vectors.remove(id);
        info!("Deleted snippet {}", id);
        Ok(())
    }

    /// Rebuild the whole vector index from the store. Used after a
    /// model change or a damaged index file. Returns the number of
    /// embedded snippets.
    pub fn rebuild(
        &self,
        store: &mut SnippetStore,
        vectors: &mut VectorIndex,
    ) -> Result<usize> {
        info!("Rebuilding vector index");
        *vectors = VectorIndex::new(self.embedder.dimension())?;

        let eligible: Vec<(u64, String)> = store
            .snippets()
            .filter(|s| s.embeddable())
            .map(|s| (s.id, s.description.clone()))
            .collect();

        if eligible.is_empty() {
            return Ok(0);
        }

        let pb = ProgressBar::new(eligible.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} descriptions embedded")
                .unwrap()
                .progress_chars("=>-"),
        );

        let batch_size = 32;
        for batch in eligible.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            for ((id, text), embedding) in batch.iter().zip(embeddings.iter()) {
                vectors.upsert(*id, embedding)?;
                set_description_hash(store, *id, Some(content_hash(text)));
                pb.inc(1);
            }
        }
        pb.finish_with_message("Embeddings generated");

        Ok(eligible.len())
    }

    /// Bring a snippet's embedding in line with its current state
    fn sync_embedding(
        &self,
        store: &mut SnippetStore,
        vectors: &mut VectorIndex,
        id: u64,
    ) -> Result<()> {
        let snippet = match store.snippet(id) {
            Some(s) => s.clone(),
            None => return Ok(()),
        };

        if !snippet.embeddable() {
            vectors.remove(id);
            if snippet.description_hash.is_some() {
                set_description_hash(store, id, None);
            }
            return Ok(());
        }

        let hash = content_hash(&snippet.description);
        if snippet.description_hash.as_deref() == Some(hash.as_str()) {
            debug!("Skipping unchanged description for snippet {}", id);
            return Ok(());
        }

        let embedding = self.embedder.embed_one(&snippet.description)?;
        vectors.upsert(id, &embedding)?;
        set_description_hash(store, id, Some(hash));
        Ok(())
    }
}

fn set_description_hash(store: &mut SnippetStore, id: u64, hash: Option<String>) {
    if let Some(snippet) = store.snippet(id) {
        let mut snippet = snippet.clone();
        snippet.description_hash = hash;
        store.put_snippet(snippet);
    }
}

fn validate_fields(name: &str, code: &str, description: &str) -> Result<()> {
    if name.is_empty() || code.is_empty() {
        return Err(SearchError::Validation(
            "name and code are required".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(SearchError::Validation(format!(
            "snippet name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    if code.chars().count() > MAX_CODE_LEN {
        return Err(SearchError::Validation(format!(
            "code cannot exceed {} characters",
            MAX_CODE_LEN
        )));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(SearchError::Validation(format!(
            "description cannot exceed {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

fn validate_tags(tags: &BTreeSet<String>) -> Result<()> {
    if tags.len() > MAX_TAG_COUNT {
        return Err(SearchError::Validation(format!(
            "a snippet can have at most {} tags",
            MAX_TAG_COUNT
        )));
    }
    if tags
        .iter()
        .any(|tag| tag.is_empty() || tag.chars().count() > MAX_TAG_LEN)
    {
        return Err(SearchError::Validation(format!(
            "each tag must be 1-{} characters",
            MAX_TAG_LEN
        )));
    }
    Ok(())
}

/// SHA-256 hash of description text, the regeneration cache key
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
