//! Visibility predicate for snippet access
//!
//! Every code path that returns snippet data runs through this filter.
//! It is the sole privacy boundary: lexical search, vector search, and
//! direct fetches must all apply it.

use crate::snippet::Snippet;
use crate::store::SnippetStore;

/// Which snippets a search call may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Public snippets, plus private ones the viewer owns or was
    /// explicitly granted
    #[default]
    PublicAndPermitted,
    /// Strictly the viewer's own snippets, regardless of visibility
    OwnerOnly,
}

/// True iff the viewer may see this snippet: it is public, they own it,
/// or an explicit grant exists. Anonymous viewers only ever see public
/// snippets.
pub fn is_visible(store: &SnippetStore, snippet: &Snippet, viewer_id: Option<u64>) -> bool {
    if snippet.is_public {
        return true;
    }
    match viewer_id {
        Some(uid) => snippet.owner_id == uid || store.has_grant(snippet.id, uid),
        None => false,
    }
}

/// The access gate applied at the end of every search pipeline
pub fn passes(
    store: &SnippetStore,
    snippet: &Snippet,
    viewer_id: Option<u64>,
    mode: AccessMode,
) -> bool {
    match mode {
        AccessMode::PublicAndPermitted => is_visible(store, snippet, viewer_id),
        AccessMode::OwnerOnly => matches!(viewer_id, Some(uid) if snippet.owner_id == uid),
    }
}
