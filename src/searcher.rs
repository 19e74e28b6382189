//! Search execution, result merging, and formatting
//!
//! `Searcher` runs the two public operations over one consistent view
//! of the store:
//!
//! - `search`: the structured/lexical pipeline (terms, tags, authors)
//! - `smart_search`: name matches blended with semantic neighbors
//!
//! Both produce the same ordering: name-priority, then like count,
//! then recency, with snippet ID as the final stable tie-break. The
//! two failure domains stay independent: an unavailable embedder fails
//! `smart_search` only, never `search`.

use crate::access::{passes, AccessMode};
use crate::config::Config;
use crate::embedder::Embedder;
use crate::error::{Result, SearchError};
use crate::lexical;
use crate::query::ParsedQuery;
use crate::snippet::{AuthorSummary, Snippet, SnippetSummary, PRESET_TAGS};
use crate::store::SnippetStore;
use crate::vector::VectorIndex;
use colored::*;
use std::collections::BTreeSet;
use tracing::debug;

/// An ordered candidate before the summary join
#[derive(Debug, Clone, Copy)]
struct Ranked {
    id: u64,
    name_priority: bool,
}

/// Hybrid searcher over a snippet catalog
pub struct Searcher<'a> {
    store: &'a SnippetStore,
    vectors: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    config: &'a Config,
}

impl<'a> Searcher<'a> {
    /// Create a searcher borrowing the catalog for the duration of a
    /// request
    pub fn new(
        store: &'a SnippetStore,
        vectors: &'a VectorIndex,
        embedder: &'a dyn Embedder,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            vectors,
            embedder,
            config,
        }
    }

    /// Structured search. An empty query is "no filter": every
    /// accessible snippet qualifies, subject to the cap.
    pub fn search(
        &self,
        query: &ParsedQuery,
        viewer_id: Option<u64>,
        mode: AccessMode,
    ) -> Result<Vec<SnippetSummary>> {
        let viewer_id = self.normalize_viewer(viewer_id);
        let hits = lexical::matches(self.store, query, viewer_id, mode);

        let ranked = self.rank(
            hits.into_iter().map(|h| Ranked {
                id: h.id,
                name_priority: h.name_priority,
            }),
            self.config.search_cap,
        );
        Ok(self.join(&ranked, viewer_id))
    }

    /// Semantic blend: snippets whose name contains the query fill up
    /// to `smart_name_slots`, nearest description embeddings fill the
    /// remainder up to `smart_cap`.
    pub fn smart_search(
        &self,
        raw_query: &str,
        viewer_id: Option<u64>,
    ) -> Result<Vec<SnippetSummary>> {
        let viewer_id = self.normalize_viewer(viewer_id);
        let trimmed: String = raw_query
            .chars()
            .take(self.config.max_query_len)
            .collect::<String>()
            .trim()
            .to_lowercase();

        // An empty query is "no filter": everything accessible, capped
        if trimmed.is_empty() {
            return Ok(self.popular_snippets(viewer_id, self.config.smart_cap));
        }

        let name_hits = self.name_matches(&trimmed, viewer_id);
        let mut merged = self.rank(name_hits.into_iter(), self.config.smart_name_slots);
        let mut seen: BTreeSet<u64> = merged.iter().map(|r| r.id).collect();

        if merged.len() < self.config.smart_cap {
            let query_embedding = self
                .embedder
                .embed_one(&trimmed)
                .map_err(|e| SearchError::SearchUnavailable(e.to_string()))?;

            // Oversample so the access filter can drop hits without
            // starving the result list
            let k = self.config.smart_cap * 2;
            let neighbors = self
                .vectors
                .search(&query_embedding, k)
                .map_err(|e| SearchError::SearchFailed(e.to_string()))?;

            for hit in neighbors {
                if merged.len() >= self.config.smart_cap {
                    break;
                }
                if seen.contains(&hit.id) {
                    continue;
                }
                let snippet = match self.store.snippet(hit.id) {
                    Some(s) => s,
                    None => continue,
                };
                if !passes(self.store, snippet, viewer_id, AccessMode::PublicAndPermitted) {
                    continue;
                }
                seen.insert(hit.id);
                merged.push(Ranked {
                    id: hit.id,
                    name_priority: false,
                });
            }
        }

        let ranked = self.rank(merged.into_iter(), self.config.smart_cap);
        debug!("Smart search returned {} results", ranked.len());
        Ok(self.join(&ranked, viewer_id))
    }

    /// Visible snippets ranked purely by popularity and recency
    pub fn popular_snippets(&self, viewer_id: Option<u64>, limit: usize) -> Vec<SnippetSummary> {
        let viewer_id = self.normalize_viewer(viewer_id);
        let candidates = self
            .store
            .snippets()
            .filter(|s| passes(self.store, s, viewer_id, AccessMode::PublicAndPermitted))
            .map(|s| Ranked {
                id: s.id,
                name_priority: false,
            });
        let ranked = self.rank(candidates, limit);
        self.join(&ranked, viewer_id)
    }

    /// Tag suggestions: tags in use on public snippets plus the preset
    /// list, prefix-matched case-insensitively
    pub fn suggest_tags(&self, prefix: &str) -> Vec<String> {
        let lower = prefix.to_lowercase();
        let mut seen = BTreeSet::new();
        let mut suggestions = Vec::new();

        let in_use = self.store.public_tag_counts();
        let presets = PRESET_TAGS.iter().map(|t| t.to_string());
        for tag in in_use.into_keys().chain(presets) {
            if !tag.to_lowercase().starts_with(&lower) {
                continue;
            }
            if seen.insert(tag.to_lowercase()) {
                suggestions.push(tag);
            }
        }
        suggestions.sort_by_key(|t| t.to_lowercase());
        suggestions
    }

    /// Tags on public snippets ranked by use count
    pub fn popular_tags(&self, limit: usize) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self.store.public_tag_counts().into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts.truncate(limit);
        counts
    }

    /// Users whose name contains the term
    pub fn search_users(&self, term: &str) -> Vec<AuthorSummary> {
        self.store
            .users_matching(term)
            .into_iter()
            .map(|user| AuthorSummary {
                name: user.name.clone(),
                bio: user.bio.clone(),
                avatar: user.avatar.clone(),
            })
            .collect()
    }

    /// Catalog statistics
    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            users: self.store.user_count(),
            snippets: self.store.snippet_count(),
            embedded: self.vectors.len(),
            model: self.config.model.model_name().to_string(),
        }
    }

    /// A viewer ID that no longer resolves to a user is treated as
    /// anonymous: no private access granted.
    fn normalize_viewer(&self, viewer_id: Option<u64>) -> Option<u64> {
        viewer_id.filter(|&uid| self.store.user_exists(uid))
    }

    /// Snippets whose name contains the (already lowercased) query
    fn name_matches(&self, lowered_query: &str, viewer_id: Option<u64>) -> Vec<Ranked> {
        self.store
            .snippets()
            .filter(|s| s.name.to_lowercase().contains(lowered_query))
            .filter(|s| passes(self.store, s, viewer_id, AccessMode::PublicAndPermitted))
            .map(|s| Ranked {
                id: s.id,
                name_priority: true,
            })
            .collect()
    }

    /// Order candidates by the uniform ranking key and truncate:
    /// name-priority desc, like count desc, creation date desc, ID
    /// desc as the stable final tie-break.
    fn rank(&self, candidates: impl Iterator<Item = Ranked>, cap: usize) -> Vec<Ranked> {
        let mut keyed: Vec<(Ranked, usize, chrono::DateTime<chrono::Utc>)> = candidates
            .filter_map(|r| {
                self.store
                    .snippet(r.id)
                    .map(|s| (r, self.store.like_count(r.id), s.created_at))
            })
            .collect();

        keyed.sort_by(|(a, a_likes, a_date), (b, b_likes, b_date)| {
            b.name_priority
                .cmp(&a.name_priority)
                .then(b_likes.cmp(a_likes))
                .then(b_date.cmp(a_date))
                .then(b.id.cmp(&a.id))
        });
        keyed.truncate(cap);
        keyed.into_iter().map(|(r, _, _)| r).collect()
    }

    /// Join ranked IDs into full summaries
    fn join(&self, ranked: &[Ranked], viewer_id: Option<u64>) -> Vec<SnippetSummary> {
        ranked
            .iter()
            .filter_map(|r| {
                let snippet = self.store.snippet(r.id)?;
                self.summarize(snippet, viewer_id)
            })
            .collect()
    }

    fn summarize(&self, snippet: &Snippet, viewer_id: Option<u64>) -> Option<SnippetSummary> {
        let author = self.store.user(snippet.owner_id)?;
        Some(SnippetSummary {
            id: snippet.id,
            name: snippet.name.clone(),
            code: snippet.code.clone(),
            description: snippet.description.clone(),
            owner_id: snippet.owner_id,
            parent_id: snippet.parent_id,
            created_at: snippet.created_at,
            is_public: snippet.is_public,
            tags: snippet_tags(self.store, snippet.id),
            like_count: self.store.like_count(snippet.id),
            is_liked_by_viewer: self.store.is_liked(snippet.id, viewer_id),
            author: AuthorSummary {
                name: author.name.clone(),
                bio: author.bio.clone(),
                avatar: author.avatar.clone(),
            },
        })
    }
}

fn snippet_tags(store: &SnippetStore, id: u64) -> BTreeSet<String> {
    store.tags_of(id).cloned().unwrap_or_default()
}

/// Catalog statistics
pub struct CatalogStats {
    /// Number of registered users
    pub users: usize,
    /// Number of stored snippets
    pub snippets: usize,
    /// Number of description embeddings
    pub embedded: usize,
    /// Model name used for embeddings
    pub model: String,
}

/// Format search results for terminal display
pub fn format_results(results: &[SnippetSummary], show_code: bool) -> String {
    let mut output = String::new();

    for (i, result) in results.iter().enumerate() {
        let visibility = if result.is_public { "" } else { " (private)" };
        output.push_str(&format!(
            "\n{} {}{} {} {}\n",
            format!("[{}]", i + 1).dimmed(),
            result.name.cyan().bold(),
            visibility.yellow(),
            format!("♥ {}", result.like_count).red(),
            format!("by {}", result.author.name).dimmed(),
        ));

        if !result.tags.is_empty() {
            let tags: Vec<String> = result.tags.iter().map(|t| format!("+{}", t)).collect();
            output.push_str(&format!("    {}\n", tags.join(" ").green()));
        }

        if !result.description.is_empty() {
            output.push_str(&format!("    {}\n", result.description));
        }

        if show_code {
            output.push_str(&format!("{}\n", "─".repeat(60).dimmed()));
            let lines: Vec<&str> = result.code.lines().collect();
            let max_lines = 15;
            for line in lines.iter().take(max_lines) {
                output.push_str(&format!("    {}\n", line));
            }
            if lines.len() > max_lines {
                output.push_str(&format!(
                    "{}\n",
                    format!("    ... ({} more lines)", lines.len() - max_lines).dimmed()
                ));
            }
        }
    }

    output
}

/// Format results as JSON
pub fn format_results_json(results: &[SnippetSummary]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::StubEmbedder;
    use crate::indexer::{Indexer, NewSnippet};
    use crate::query::parse_query;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        store: SnippetStore,
        vectors: VectorIndex,
        embedder: StubEmbedder,
        config: Config,
        alice: u64,
        bob: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let mut store = SnippetStore::new();
            let alice = store.add_user("alice", "Pythonista", None).unwrap();
            let bob = store.add_user("bob", "", None).unwrap();
            let embedder = StubEmbedder::new();
            let vectors = VectorIndex::new(embedder.dimension).unwrap();
            Self {
                store,
                vectors,
                embedder,
                config: Config::default(),
                alice,
                bob,
            }
        }

        fn add(
            &mut self,
            name: &str,
            description: &str,
            owner: u64,
            is_public: bool,
            tags: &[&str],
        ) -> u64 {
            let indexer = Indexer::new(&self.embedder);
            indexer
                .create_snippet(
                    &mut self.store,
                    &mut self.vectors,
                    NewSnippet {
                        name: name.to_string(),
                        code: "fn main() {}".to_string(),
                        description: description.to_string(),
                        owner_id: owner,
                        parent_id: None,
                        is_public,
                        tags: tags.iter().map(|t| t.to_string()).collect(),
                        permitted_users: BTreeSet::new(),
                    },
                )
                .unwrap()
        }

        fn set_created(&mut self, id: u64, day: u32) {
            let mut snippet = self.store.snippet(id).unwrap().clone();
            snippet.created_at = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
            self.store.put_snippet(snippet);
        }

        fn searcher(&self) -> Searcher<'_> {
            Searcher::new(&self.store, &self.vectors, &self.embedder, &self.config)
        }
    }

    fn result_ids(results: &[SnippetSummary]) -> Vec<u64> {
        results.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_ranking_name_priority_then_likes_then_date() {
        let mut fx = Fixture::new();
        let by_desc = fx.add("Helper", "a sorting helper", fx.alice, true, &[]);
        let old_liked = fx.add("Sorting old", "", fx.alice, true, &[]);
        let recent = fx.add("Sorting new", "", fx.alice, true, &[]);
        fx.set_created(by_desc, 5);
        fx.set_created(old_liked, 1);
        fx.set_created(recent, 3);
        fx.store.add_like(old_liked, fx.bob);

        let results = fx
            .searcher()
            .search(&parse_query("sorting"), None, AccessMode::PublicAndPermitted)
            .unwrap();
        // Name matches precede the description match; likes beat
        // recency within the name tier
        assert_eq!(result_ids(&results), vec![old_liked, recent, by_desc]);
    }

    #[test]
    fn test_cap_enforced() {
        let mut fx = Fixture::new();
        fx.config.search_cap = 5;
        for i in 0..8 {
            fx.add(&format!("snippet {}", i), "", fx.alice, true, &[]);
        }

        let results = fx
            .searcher()
            .search(&parse_query(""), None, AccessMode::PublicAndPermitted)
            .unwrap();
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_idempotent() {
        let mut fx = Fixture::new();
        for i in 0..10 {
            fx.add(&format!("snippet {}", i), "words", fx.alice, true, &["Tag"]);
        }

        let searcher = fx.searcher();
        let first = searcher
            .search(&parse_query("snippet +tag"), None, AccessMode::PublicAndPermitted)
            .unwrap();
        let second = searcher
            .search(&parse_query("snippet +tag"), None, AccessMode::PublicAndPermitted)
            .unwrap();
        assert_eq!(result_ids(&first), result_ids(&second));
    }

    #[test]
    fn test_unknown_viewer_demoted_to_anonymous() {
        let mut fx = Fixture::new();
        fx.add("Private thing", "", fx.alice, false, &[]);

        let results = fx
            .searcher()
            .search(
                &parse_query("private"),
                Some(9999),
                AccessMode::PublicAndPermitted,
            )
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_summary_join_fields() {
        let mut fx = Fixture::new();
        let id = fx.add(
            "Graph walk",
            "breadth first",
            fx.alice,
            true,
            &["Algorithms"],
        );
        fx.store.add_like(id, fx.bob);

        let results = fx
            .searcher()
            .search(
                &parse_query("graph"),
                Some(fx.bob),
                AccessMode::PublicAndPermitted,
            )
            .unwrap();
        let summary = &results[0];
        assert_eq!(summary.author.name, "alice");
        assert_eq!(summary.author.bio, "Pythonista");
        assert_eq!(summary.like_count, 1);
        assert!(summary.is_liked_by_viewer);
        assert!(summary.tags.contains("Algorithms"));
    }

    #[test]
    fn test_smart_search_blends_name_and_vector_hits() {
        let mut fx = Fixture::new();
        let named = fx.add("linked list reversal", "", fx.alice, true, &[]);
        let semantic = fx.add(
            "Pointer shuffle",
            "reversal of a linked list in place",
            fx.alice,
            true,
            &[],
        );
        fx.add("CSS grid", "two column page layout", fx.alice, true, &[]);

        let results = fx
            .searcher()
            .smart_search("linked list reversal", None)
            .unwrap();
        let ids = result_ids(&results);
        assert!(ids.contains(&named));
        assert!(ids.contains(&semantic));
        // The name match outranks the vector-only hit
        assert_eq!(ids[0], named);
    }

    #[test]
    fn test_smart_search_deduplicates() {
        let mut fx = Fixture::new();
        let both = fx.add(
            "binary search",
            "binary search over sorted data",
            fx.alice,
            true,
            &[],
        );

        let results = fx.searcher().smart_search("binary search", None).unwrap();
        assert_eq!(result_ids(&results), vec![both]);
    }

    #[test]
    fn test_smart_search_cap() {
        let mut fx = Fixture::new();
        fx.config.smart_cap = 6;
        fx.config.smart_name_slots = 4;
        for i in 0..10 {
            fx.add(&format!("widget {}", i), "widget helpers", fx.alice, true, &[]);
        }

        let results = fx.searcher().smart_search("widget", None).unwrap();
        assert_eq!(results.len(), 6);
        // Name slots filled first, vector hits fill the remainder
        assert!(results.iter().all(|r| r.name.contains("widget")));
    }

    #[test]
    fn test_smart_search_respects_visibility() {
        let mut fx = Fixture::new();
        fx.add("quiet helper", "secret sorting trick", fx.bob, false, &[]);

        let results = fx.searcher().smart_search("sorting trick", None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_broken_embedder_fails_smart_search_only() {
        let mut fx = Fixture::new();
        fx.add("Sorting", "classic quicksort", fx.alice, true, &[]);
        fx.embedder = StubEmbedder::broken();

        let searcher = fx.searcher();
        let err = searcher.smart_search("sorting", None).unwrap_err();
        assert!(matches!(err, SearchError::SearchUnavailable(_)));

        // Lexical search is an independent failure domain
        let results = searcher
            .search(&parse_query("sorting"), None, AccessMode::PublicAndPermitted)
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_spec_scenario_tag_tiers_and_privacy() {
        let mut fx = Fixture::new();
        let bst = fx.add(
            "Binary Search Tree",
            "",
            fx.alice,
            true,
            &["Python", "DataStructures"],
        );
        for i in 0..3 {
            let uid = fx.store.add_user(&format!("fan{}", i), "", None).unwrap();
            fx.store.add_like(bst, uid);
        }
        let private = fx.add("Search internals", "", fx.bob, false, &[]);

        let searcher = fx.searcher();

        // Exact tag tier
        let results = searcher
            .search(&parse_query("+python"), None, AccessMode::PublicAndPermitted)
            .unwrap();
        assert_eq!(result_ids(&results), vec![bst]);

        // Prefix fallback
        let results = searcher
            .search(&parse_query("+pyth"), None, AccessMode::PublicAndPermitted)
            .unwrap();
        assert_eq!(result_ids(&results), vec![bst]);

        // Exclusion wins over a name match
        let results = searcher
            .search(&parse_query("search -python"), None, AccessMode::PublicAndPermitted)
            .unwrap();
        assert!(!result_ids(&results).contains(&bst));

        // Anonymous viewers never see the private snippet
        let results = searcher
            .search(&parse_query("search"), None, AccessMode::PublicAndPermitted)
            .unwrap();
        assert!(!result_ids(&results).contains(&private));
    }

    #[test]
    fn test_grant_scenario() {
        let mut fx = Fixture::new();
        let carol = fx.store.add_user("carol", "", None).unwrap();
        let dave = fx.store.add_user("dave", "", None).unwrap();

        let indexer = Indexer::new(&fx.embedder);
        let secret = indexer
            .create_snippet(
                &mut fx.store,
                &mut fx.vectors,
                NewSnippet {
                    name: "Team deploy script".to_string(),
                    code: "deploy()".to_string(),
                    description: String::new(),
                    owner_id: fx.alice,
                    parent_id: None,
                    is_public: false,
                    tags: BTreeSet::new(),
                    permitted_users: [carol].into_iter().collect(),
                },
            )
            .unwrap();

        let searcher = fx.searcher();
        let as_carol = searcher
            .search(&parse_query("deploy"), Some(carol), AccessMode::PublicAndPermitted)
            .unwrap();
        assert_eq!(result_ids(&as_carol), vec![secret]);

        let as_dave = searcher
            .search(&parse_query("deploy"), Some(dave), AccessMode::PublicAndPermitted)
            .unwrap();
        assert!(as_dave.is_empty());
    }

    #[test]
    fn test_popular_and_suggestions() {
        let mut fx = Fixture::new();
        let hot = fx.add("Hot snippet", "", fx.alice, true, &["Python"]);
        let cold = fx.add("Cold snippet", "", fx.alice, true, &["Pytest"]);
        fx.add("Hidden", "", fx.alice, false, &["PrivateTag"]);
        fx.store.add_like(hot, fx.bob);

        let searcher = fx.searcher();
        let popular = searcher.popular_snippets(None, 10);
        assert_eq!(result_ids(&popular), vec![hot, cold]);

        let tags = searcher.suggest_tags("py");
        assert!(tags.contains(&"Python".to_string()));
        assert!(tags.contains(&"Pytest".to_string()));
        assert!(!tags.iter().any(|t| t == "PrivateTag"));

        let users = searcher.search_users("ali");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "alice");
    }
}
