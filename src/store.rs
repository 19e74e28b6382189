//! In-memory snippet store with snapshot persistence
//!
//! Holds users, snippets, tags, permission grants, and likes, and
//! answers the read queries the search pipeline needs. A search call
//! borrows the store immutably for its whole duration, so every
//! sub-query observes one consistent view.
//!
//! Iteration is keyed on BTree maps: identical queries against an
//! unchanged store always produce identical orderings.

use crate::error::{Result, SearchError};
use crate::snippet::{Snippet, User, MAX_BIO_LEN, MAX_TAG_COUNT, MAX_TAG_LEN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// The queryable relational view over snippet-sharing data
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SnippetStore {
    users: BTreeMap<u64, User>,
    snippets: BTreeMap<u64, Snippet>,
    tags: BTreeMap<u64, BTreeSet<String>>,
    grants: BTreeMap<u64, BTreeSet<u64>>,
    likes: BTreeMap<u64, BTreeSet<u64>>,
    next_user_id: u64,
    next_snippet_id: u64,
}

impl SnippetStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            next_user_id: 1,
            next_snippet_id: 1,
            ..Default::default()
        }
    }

    /// Load a store snapshot from disk
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SearchError::NoCatalog);
        }
        let bytes = std::fs::read(path)?;
        let store: SnippetStore = bincode::deserialize(&bytes)?;
        info!(
            "Loaded store: {} users, {} snippets",
            store.users.len(),
            store.snippets.len()
        );
        Ok(store)
    }

    /// Save a store snapshot to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serialize(self)?;
        std::fs::write(path, bytes)?;
        debug!("Saved store to {:?}", path);
        Ok(())
    }

    // --- users ---

    /// Create a user. Names are unique case-insensitively.
    pub fn add_user(&mut self, name: &str, bio: &str, avatar: Option<String>) -> Result<u64> {
        if name.is_empty() {
            return Err(SearchError::Validation("user name must not be empty".into()));
        }
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(SearchError::Validation(format!(
                "bio cannot exceed {} characters",
                MAX_BIO_LEN
            )));
        }
        if self.user_by_name(name).is_some() {
            return Err(SearchError::Validation(format!("user name in use: {}", name)));
        }

        let id = self.next_user_id;
        self.next_user_id += 1;
        self.users.insert(
            id,
            User {
                id,
                name: name.to_string(),
                bio: bio.to_string(),
                avatar,
            },
        );
        Ok(id)
    }

    /// Look up a user by ID
    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.get(&id)
    }

    /// Whether a user with this ID exists
    pub fn user_exists(&self, id: u64) -> bool {
        self.users.contains_key(&id)
    }

    /// Case-insensitive exact lookup by name
    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        let lower = name.to_lowercase();
        self.users.values().find(|u| u.name.to_lowercase() == lower)
    }

    /// Users whose name contains the term, case-insensitively
    pub fn users_matching(&self, term: &str) -> Vec<&User> {
        let lower = term.to_lowercase();
        self.users
            .values()
            .filter(|u| u.name.to_lowercase().contains(&lower))
            .collect()
    }

    // --- snippets ---

    /// Reserve the next snippet ID
    pub fn allocate_snippet_id(&mut self) -> u64 {
        let id = self.next_snippet_id;
        self.next_snippet_id += 1;
        id
    }

    /// Insert or replace a snippet record
    pub fn put_snippet(&mut self, snippet: Snippet) {
        self.snippets.insert(snippet.id, snippet);
    }

    /// Look up a snippet by ID
    pub fn snippet(&self, id: u64) -> Option<&Snippet> {
        self.snippets.get(&id)
    }

    /// All snippets, in ascending ID order
    pub fn snippets(&self) -> impl Iterator<Item = &Snippet> {
        self.snippets.values()
    }

    /// Number of stored snippets
    pub fn snippet_count(&self) -> usize {
        self.snippets.len()
    }

    /// Number of registered users
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Remove a snippet and everything attached to it. Children of the
    /// removed snippet keep existing with their lineage cleared.
    pub fn remove_snippet(&mut self, id: u64) -> Option<Snippet> {
        let removed = self.snippets.remove(&id)?;
        self.tags.remove(&id);
        self.grants.remove(&id);
        self.likes.remove(&id);
        for snippet in self.snippets.values_mut() {
            if snippet.parent_id == Some(id) {
                snippet.parent_id = None;
            }
        }
        debug!("Removed snippet {}", id);
        Some(removed)
    }

    // --- tags ---

    /// Replace a snippet's tag set wholesale
    pub fn set_tags(&mut self, snippet_id: u64, tags: BTreeSet<String>) -> Result<()> {
        if tags.len() > MAX_TAG_COUNT {
            return Err(SearchError::Validation(format!(
                "a snippet can have at most {} tags",
                MAX_TAG_COUNT
            )));
        }
        for tag in &tags {
            if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
                return Err(SearchError::Validation(format!(
                    "each tag must be 1-{} characters: {:?}",
                    MAX_TAG_LEN, tag
                )));
            }
        }
        if tags.is_empty() {
            self.tags.remove(&snippet_id);
        } else {
            self.tags.insert(snippet_id, tags);
        }
        Ok(())
    }

    /// Tags on a snippet, in stored case
    pub fn tags_of(&self, snippet_id: u64) -> Option<&BTreeSet<String>> {
        self.tags.get(&snippet_id)
    }

    /// Whether the snippet carries this exact tag, case-insensitively
    pub fn has_tag(&self, snippet_id: u64, tag: &str) -> bool {
        let lower = tag.to_lowercase();
        self.tags_of(snippet_id)
            .map(|tags| tags.iter().any(|t| t.to_lowercase() == lower))
            .unwrap_or(false)
    }

    /// Every distinct tag in use on public snippets, with use counts
    pub fn public_tag_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for snippet in self.snippets.values().filter(|s| s.is_public) {
            if let Some(tags) = self.tags.get(&snippet.id) {
                for tag in tags {
                    *counts.entry(tag.clone()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    // --- permission grants ---

    /// Replace a snippet's grant list wholesale. Grants only exist for
    /// private snippets; the owner is implicitly granted and never
    /// stored.
    pub fn set_grants(&mut self, snippet_id: u64, users: &BTreeSet<u64>) {
        self.grants.remove(&snippet_id);

        let snippet = match self.snippets.get(&snippet_id) {
            Some(s) => s,
            None => return,
        };
        if snippet.is_public {
            return;
        }

        let granted: BTreeSet<u64> = users
            .iter()
            .copied()
            .filter(|&uid| uid != snippet.owner_id && self.users.contains_key(&uid))
            .collect();
        if !granted.is_empty() {
            self.grants.insert(snippet_id, granted);
        }
    }

    /// Whether an explicit grant exists for (snippet, user)
    pub fn has_grant(&self, snippet_id: u64, user_id: u64) -> bool {
        self.grants
            .get(&snippet_id)
            .map(|users| users.contains(&user_id))
            .unwrap_or(false)
    }

    // --- likes ---

    /// Record a like. Returns false if the user already liked this
    /// snippet (the like count is unchanged in that case).
    pub fn add_like(&mut self, snippet_id: u64, user_id: u64) -> bool {
        if !self.snippets.contains_key(&snippet_id) {
            return false;
        }
        self.likes.entry(snippet_id).or_default().insert(user_id)
    }

    /// Remove a like, if present
    pub fn remove_like(&mut self, snippet_id: u64, user_id: u64) {
        if let Some(users) = self.likes.get_mut(&snippet_id) {
            users.remove(&user_id);
            if users.is_empty() {
                self.likes.remove(&snippet_id);
            }
        }
    }

    /// Total likes on a snippet
    pub fn like_count(&self, snippet_id: u64) -> usize {
        self.likes.get(&snippet_id).map(|u| u.len()).unwrap_or(0)
    }

    /// Whether this viewer has liked this snippet
    pub fn is_liked(&self, snippet_id: u64, viewer_id: Option<u64>) -> bool {
        match viewer_id {
            Some(uid) => self
                .likes
                .get(&snippet_id)
                .map(|users| users.contains(&uid))
                .unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_snippet(id: u64, owner_id: u64, is_public: bool) -> Snippet {
        Snippet {
            id,
            name: format!("snippet {}", id),
            code: "fn main() {}".to_string(),
            description: String::new(),
            owner_id,
            parent_id: None,
            created_at: Utc::now(),
            is_public,
            description_hash: None,
        }
    }

    fn store_with_user() -> (SnippetStore, u64) {
        let mut store = SnippetStore::new();
        let uid = store.add_user("alice", "", None).unwrap();
        (store, uid)
    }

    #[test]
    fn test_user_names_unique_case_insensitive() {
        let (mut store, _) = store_with_user();
        assert!(store.add_user("Alice", "", None).is_err());
        assert!(store.add_user("bob", "", None).is_ok());
        assert!(store.user_by_name("ALICE").is_some());
    }

    #[test]
    fn test_single_like() {
        let (mut store, uid) = store_with_user();
        let sid = store.allocate_snippet_id();
        store.put_snippet(test_snippet(sid, uid, true));

        assert!(!store.is_liked(sid, Some(uid)));
        assert!(store.add_like(sid, uid));
        assert!(store.is_liked(sid, Some(uid)));
        assert_eq!(store.like_count(sid), 1);
    }

    #[test]
    fn test_duplicate_likes() {
        let (mut store, uid) = store_with_user();
        let sid = store.allocate_snippet_id();
        store.put_snippet(test_snippet(sid, uid, true));

        assert!(store.add_like(sid, uid));
        assert!(!store.add_like(sid, uid));
        assert_eq!(store.like_count(sid), 1);
    }

    #[test]
    fn test_remove_like_idempotent() {
        let (mut store, uid) = store_with_user();
        let sid = store.allocate_snippet_id();
        store.put_snippet(test_snippet(sid, uid, true));

        store.add_like(sid, uid);
        for _ in 0..2 {
            store.remove_like(sid, uid);
            assert!(!store.is_liked(sid, Some(uid)));
            assert_eq!(store.like_count(sid), 0);
        }
    }

    #[test]
    fn test_delete_parent_clears_lineage() {
        let (mut store, uid) = store_with_user();
        let parent = store.allocate_snippet_id();
        store.put_snippet(test_snippet(parent, uid, true));
        let child = store.allocate_snippet_id();
        let mut child_snippet = test_snippet(child, uid, true);
        child_snippet.parent_id = Some(parent);
        store.put_snippet(child_snippet);

        store.remove_snippet(parent);
        assert!(store.snippet(parent).is_none());
        assert_eq!(store.snippet(child).unwrap().parent_id, None);
    }

    #[test]
    fn test_remove_snippet_cascades() {
        let (mut store, uid) = store_with_user();
        let other = store.add_user("bob", "", None).unwrap();
        let sid = store.allocate_snippet_id();
        store.put_snippet(test_snippet(sid, uid, false));
        store
            .set_tags(sid, ["python".to_string()].into_iter().collect())
            .unwrap();
        store.set_grants(sid, &[other].into_iter().collect());
        store.add_like(sid, other);

        store.remove_snippet(sid);
        assert!(store.tags_of(sid).is_none());
        assert!(!store.has_grant(sid, other));
        assert_eq!(store.like_count(sid), 0);
    }

    #[test]
    fn test_grants_only_for_private_snippets() {
        let (mut store, uid) = store_with_user();
        let other = store.add_user("bob", "", None).unwrap();

        let public = store.allocate_snippet_id();
        store.put_snippet(test_snippet(public, uid, true));
        store.set_grants(public, &[other].into_iter().collect());
        assert!(!store.has_grant(public, other));

        let private = store.allocate_snippet_id();
        store.put_snippet(test_snippet(private, uid, false));
        store.set_grants(private, &[other, uid].into_iter().collect());
        assert!(store.has_grant(private, other));
        // Owner is implicit, never stored
        assert!(!store.has_grant(private, uid));
    }

    #[test]
    fn test_tag_limits() {
        let (mut store, uid) = store_with_user();
        let sid = store.allocate_snippet_id();
        store.put_snippet(test_snippet(sid, uid, true));

        let too_long: BTreeSet<String> = ["x".repeat(MAX_TAG_LEN + 1)].into_iter().collect();
        assert!(store.set_tags(sid, too_long).is_err());

        let too_many: BTreeSet<String> =
            (0..=MAX_TAG_COUNT).map(|i| format!("tag{}", i)).collect();
        assert!(store.set_tags(sid, too_many).is_err());

        let fine: BTreeSet<String> = ["Python".to_string()].into_iter().collect();
        assert!(store.set_tags(sid, fine).is_ok());
        assert!(store.has_tag(sid, "python"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");

        let (mut store, uid) = store_with_user();
        let sid = store.allocate_snippet_id();
        store.put_snippet(test_snippet(sid, uid, true));
        store.save(&path).unwrap();

        let loaded = SnippetStore::load(&path).unwrap();
        assert_eq!(loaded.snippet_count(), 1);
        assert_eq!(loaded.user_count(), 1);
        assert!(loaded.snippet(sid).is_some());
    }
}
