//! Lexical matching over names, descriptions, tags, and authors
//!
//! Turns a parsed query into a candidate set by composing in-memory
//! predicates, never interpolated query strings. Filters apply in
//! order: general terms, authors, include tags, exclude tags, then the
//! access gate as the final hard condition.
//!
//! Two filters carry a fallback tier:
//! - authors: exact case-insensitive name match, else a contains match
//!   on the first given name token only
//! - include tags: exact case-insensitive membership when any snippet
//!   carries the tag exactly, else prefix membership

use crate::access::{passes, AccessMode};
use crate::query::ParsedQuery;
use crate::snippet::Snippet;
use crate::store::SnippetStore;
use std::collections::BTreeSet;
use tracing::debug;

/// A lexical candidate prior to ranking and joining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexicalHit {
    /// Matched snippet ID
    pub id: u64,
    /// True when the *name* contains a general term; description-only
    /// matches rank below name matches
    pub name_priority: bool,
}

/// Produce the candidate set for a structured query. Candidates come
/// back in ascending ID order; ranking is the merger's job.
pub fn matches(
    store: &SnippetStore,
    query: &ParsedQuery,
    viewer_id: Option<u64>,
    mode: AccessMode,
) -> Vec<LexicalHit> {
    let terms: Vec<String> = query
        .general_terms
        .iter()
        .map(|t| t.to_lowercase())
        .collect();

    let author_filter = resolve_authors(store, &query.usernames);
    let tag_predicates = resolve_include_tags(store, &query.include_tags);
    let excluded: Vec<String> = query.exclude_tags.iter().map(|t| t.to_lowercase()).collect();

    let mut hits = Vec::new();
    for snippet in store.snippets() {
        let name_priority = match term_match(snippet, &terms) {
            Some(priority) => priority,
            None => continue,
        };
        if !author_filter.accepts(snippet.owner_id) {
            continue;
        }
        if !tag_predicates
            .iter()
            .all(|predicate| predicate.accepts(store, snippet.id))
        {
            continue;
        }
        if excluded.iter().any(|tag| store.has_tag(snippet.id, tag)) {
            continue;
        }
        if !passes(store, snippet, viewer_id, mode) {
            continue;
        }
        hits.push(LexicalHit {
            id: snippet.id,
            name_priority,
        });
    }

    debug!("Lexical match produced {} candidates", hits.len());
    hits
}

/// None = filtered out; Some(priority) = kept, with the name flag
fn term_match(snippet: &Snippet, terms: &[String]) -> Option<bool> {
    if terms.is_empty() {
        return Some(false);
    }
    let name = snippet.name.to_lowercase();
    let description = snippet.description.to_lowercase();

    let in_name = terms.iter().any(|t| name.contains(t.as_str()));
    if in_name {
        return Some(true);
    }
    if terms.iter().any(|t| description.contains(t.as_str())) {
        return Some(false);
    }
    None
}

enum AuthorFilter {
    /// No username filter given
    Any,
    /// At least one exact name matched; only those owners qualify
    Exact(BTreeSet<u64>),
    /// No exact match anywhere; owners whose name contains the first
    /// given token qualify
    Fuzzy(BTreeSet<u64>),
}

impl AuthorFilter {
    fn accepts(&self, owner_id: u64) -> bool {
        match self {
            AuthorFilter::Any => true,
            AuthorFilter::Exact(ids) | AuthorFilter::Fuzzy(ids) => ids.contains(&owner_id),
        }
    }
}

fn resolve_authors(store: &SnippetStore, usernames: &[String]) -> AuthorFilter {
    if usernames.is_empty() {
        return AuthorFilter::Any;
    }

    let exact: BTreeSet<u64> = usernames
        .iter()
        .filter_map(|name| store.user_by_name(name))
        .map(|user| user.id)
        .collect();
    if !exact.is_empty() {
        return AuthorFilter::Exact(exact);
    }

    // Only the first fuzzy author term is honored
    let fuzzy: BTreeSet<u64> = store
        .users_matching(&usernames[0])
        .into_iter()
        .map(|user| user.id)
        .collect();
    AuthorFilter::Fuzzy(fuzzy)
}

enum TagPredicate {
    /// Some snippet carries the tag exactly; exact membership required
    Exact(String),
    /// No exact use anywhere; prefix membership suffices
    Prefix(String),
}

impl TagPredicate {
    fn accepts(&self, store: &SnippetStore, snippet_id: u64) -> bool {
        match self {
            TagPredicate::Exact(tag) => store.has_tag(snippet_id, tag),
            TagPredicate::Prefix(prefix) => store
                .tags_of(snippet_id)
                .map(|tags| tags.iter().any(|t| t.to_lowercase().starts_with(prefix.as_str())))
                .unwrap_or(false),
        }
    }
}

/// Decide exact vs prefix tier per requested tag, against the whole
/// corpus. A snippet must satisfy every requested tag.
fn resolve_include_tags(store: &SnippetStore, include_tags: &[String]) -> Vec<TagPredicate> {
    include_tags
        .iter()
        .map(|tag| {
            let lower = tag.to_lowercase();
            let exact_exists = store
                .snippets()
                .any(|snippet| store.has_tag(snippet.id, &lower));
            if exact_exists {
                TagPredicate::Exact(lower)
            } else {
                TagPredicate::Prefix(lower)
            }
        })
        .collect()
}
