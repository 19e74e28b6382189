//! Structured query parsing
//!
//! Splits a raw search string into include-tag, exclude-tag, username,
//! and general-term tokens using sigil prefixes:
//!
//! - `+tag`  include snippets carrying the tag
//! - `-tag`  exclude snippets carrying the tag
//! - `@name` filter by author
//! - anything else is a general term matched against names and
//!   descriptions
//!
//! Case is preserved here; all downstream comparisons are
//! case-insensitive. Queries longer than the configured cap are
//! truncated, never rejected.

/// Default cap on raw query length, in characters
pub const MAX_QUERY_LEN: usize = 300;

/// A raw query split into filter components. Each list is deduplicated
/// preserving first-seen order: the username fallback only honors the
/// first fuzzy token, so order matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Terms matched against snippet names and descriptions
    pub general_terms: Vec<String>,
    /// Tags results must carry
    pub include_tags: Vec<String>,
    /// Tags results must not carry
    pub exclude_tags: Vec<String>,
    /// Author names to filter by
    pub usernames: Vec<String>,
}

impl ParsedQuery {
    /// True if no component carries any filter
    pub fn is_empty(&self) -> bool {
        self.general_terms.is_empty()
            && self.include_tags.is_empty()
            && self.exclude_tags.is_empty()
            && self.usernames.is_empty()
    }
}

/// Parse a raw query string with the default length cap
pub fn parse_query(raw: &str) -> ParsedQuery {
    parse_query_capped(raw, MAX_QUERY_LEN)
}

/// Parse a raw query string, truncating input beyond `max_len` chars
pub fn parse_query_capped(raw: &str, max_len: usize) -> ParsedQuery {
    let truncated: String = raw.chars().take(max_len).collect();

    let mut parsed = ParsedQuery::default();
    for token in truncated.split_whitespace() {
        // First-matched sigil wins; a bare sigil carries no name and is
        // dropped.
        if let Some(tag) = token.strip_prefix('+') {
            push_unique(&mut parsed.include_tags, tag);
        } else if let Some(tag) = token.strip_prefix('-') {
            push_unique(&mut parsed.exclude_tags, tag);
        } else if let Some(name) = token.strip_prefix('@') {
            push_unique(&mut parsed.usernames, name);
        } else {
            push_unique(&mut parsed.general_terms, token);
        }
    }
    parsed
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if value.is_empty() {
        return;
    }
    let lower = value.to_lowercase();
    if !list.iter().any(|v| v.to_lowercase() == lower) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigil_classification() {
        let parsed = parse_query("+python -java @alice binary tree");
        assert_eq!(parsed.include_tags, vec!["python"]);
        assert_eq!(parsed.exclude_tags, vec!["java"]);
        assert_eq!(parsed.usernames, vec!["alice"]);
        assert_eq!(parsed.general_terms, vec!["binary", "tree"]);
    }

    #[test]
    fn test_empty_tokens_dropped() {
        let parsed = parse_query("  foo   bar  ");
        assert_eq!(parsed.general_terms, vec!["foo", "bar"]);
    }

    #[test]
    fn test_bare_sigils_dropped() {
        let parsed = parse_query("+ - @ foo");
        assert!(parsed.include_tags.is_empty());
        assert!(parsed.exclude_tags.is_empty());
        assert!(parsed.usernames.is_empty());
        assert_eq!(parsed.general_terms, vec!["foo"]);
    }

    #[test]
    fn test_first_sigil_wins() {
        // The rest of the token is kept verbatim, later sigils included
        let parsed = parse_query("+-tag -@user");
        assert_eq!(parsed.include_tags, vec!["-tag"]);
        assert_eq!(parsed.exclude_tags, vec!["@user"]);
    }

    #[test]
    fn test_case_preserved_duplicates_merged() {
        let parsed = parse_query("+Python +python @Alice @alice tree Tree");
        assert_eq!(parsed.include_tags, vec!["Python"]);
        assert_eq!(parsed.usernames, vec!["Alice"]);
        assert_eq!(parsed.general_terms, vec!["tree"]);
    }

    #[test]
    fn test_long_query_truncated() {
        let raw = format!("{} +late", "x".repeat(MAX_QUERY_LEN));
        let parsed = parse_query(&raw);
        assert!(parsed.include_tags.is_empty());
        assert_eq!(parsed.general_terms.len(), 1);
        assert_eq!(parsed.general_terms[0].chars().count(), MAX_QUERY_LEN);
    }

    #[test]
    fn test_empty_query_is_no_filter() {
        assert!(parse_query("").is_empty());
        assert!(parse_query("   ").is_empty());
    }
}
