//! Snippet and user records shared across the crate
//!
//! These are the rows the search pipeline reads. Input limits match the
//! ones enforced at snippet creation time; exceeding them is a
//! validation error, never silent truncation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum snippet name length in characters
pub const MAX_NAME_LEN: usize = 100;
/// Maximum code body length in characters
pub const MAX_CODE_LEN: usize = 5000;
/// Maximum description length in characters
pub const MAX_DESCRIPTION_LEN: usize = 1000;
/// Maximum length of a single tag
pub const MAX_TAG_LEN: usize = 20;
/// Maximum number of tags per snippet
pub const MAX_TAG_COUNT: usize = 15;
/// Maximum user bio length in characters
pub const MAX_BIO_LEN: usize = 250;

/// Curated tags offered for suggestion/autocomplete. Not a closed set;
/// users may tag snippets with anything within the length limits.
pub const PRESET_TAGS: &[&str] = &[
    "Python",
    "JavaScript",
    "TypeScript",
    "Rust",
    "Go",
    "Java",
    "C",
    "C++",
    "SQL",
    "Shell",
    "HTML",
    "CSS",
    "Algorithms",
    "DataStructures",
    "Regex",
    "Testing",
    "Networking",
    "CLI",
    "WebDev",
    "Snippets",
];

/// A registered user, as the search pipeline sees them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique integer ID
    pub id: u64,
    /// Unique display name (compared case-insensitively)
    pub name: String,
    /// Profile bio, possibly empty
    pub bio: String,
    /// Reference to a profile picture, if one is set
    pub avatar: Option<String>,
}

/// A stored code snippet
///
/// An empty `description` means "no description". `description_hash` is
/// present iff a description embedding is present in the vector index:
/// it is the SHA-256 of the embedded text, used to skip regeneration
/// when an edit leaves the description unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    /// Unique integer ID
    pub id: u64,
    /// Snippet name
    pub name: String,
    /// The code body
    pub code: String,
    /// User-provided description; empty if none
    pub description: String,
    /// The author's user ID
    pub owner_id: u64,
    /// Remix lineage: the snippet this one was remixed from
    pub parent_id: Option<u64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Public snippets are visible to everyone; private ones only to
    /// the owner and explicitly permitted users
    pub is_public: bool,
    /// SHA-256 of the description text currently embedded, if any
    pub description_hash: Option<String>,
}

impl Snippet {
    /// Whether this snippet should have a description embedding.
    /// Embeddings exist iff the snippet is public and described.
    pub fn embeddable(&self) -> bool {
        self.is_public && !self.description.is_empty()
    }
}

/// Public profile slice attached to each search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorSummary {
    /// The author's display name
    pub name: String,
    /// The author's bio
    pub bio: String,
    /// Reference to the author's profile picture, if any
    pub avatar: Option<String>,
}

/// A fully joined search result row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetSummary {
    pub id: u64,
    pub name: String,
    pub code: String,
    pub description: String,
    pub owner_id: u64,
    pub parent_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub is_public: bool,
    /// Tags on this snippet, in stored case
    pub tags: BTreeSet<String>,
    /// Total likes
    pub like_count: usize,
    /// Whether the requesting viewer has liked this snippet
    pub is_liked_by_viewer: bool,
    /// The author's public profile summary
    pub author: AuthorSummary,
}
