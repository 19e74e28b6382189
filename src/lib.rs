//! # snipsearch - Access-controlled hybrid snippet search
//!
//! The search core of a snippet-sharing service: lexical matching over
//! names, descriptions, tags, and authors blended with semantic
//! similarity over description embeddings, with a per-result
//! visibility filter and a single deterministic ordering.
//!
//! ## Features
//!
//! - **Hybrid**: substring/prefix/exact lexical tiers plus k-NN over
//!   local ONNX embeddings - no API calls, everything on your machine
//! - **Access-controlled**: every path through search applies the same
//!   visibility predicate (public, owner, or explicitly granted)
//! - **Deterministic**: one ranking key everywhere - name priority,
//!   likes, recency, ID - so identical queries return identical lists
//!
//! ## Example
//!
//! ```no_run
//! use snipsearch::{
//!     AccessMode, Config, FastembedEmbedder, Searcher, SnippetStore, VectorIndex,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(&std::path::PathBuf::from(".snipsearch"))?;
//!     let store = SnippetStore::load(&config.store_path())?;
//!     let vectors = VectorIndex::load(&config.vectors_path(), config.model.dimension())?;
//!     let embedder = FastembedEmbedder::new(config.model.clone());
//!
//!     let searcher = Searcher::new(&store, &vectors, &embedder, &config);
//!     let query = snipsearch::parse_query("+python binary tree");
//!     let results = searcher.search(&query, None, AccessMode::PublicAndPermitted)?;
//!
//!     for result in results {
//!         println!("{} by {} ({} likes)", result.name, result.author.name, result.like_count);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod config;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod lexical;
pub mod query;
pub mod searcher;
pub mod snippet;
pub mod store;
pub mod vector;

// Re-export commonly used types
pub use access::{is_visible, AccessMode};
pub use config::{Config, EmbeddingModel};
pub use embedder::{Embedder, FastembedEmbedder};
pub use error::{Result, SearchError};
pub use indexer::{Indexer, NewSnippet, SnippetPatch};
pub use query::{parse_query, parse_query_capped, ParsedQuery};
pub use searcher::{format_results, format_results_json, CatalogStats, Searcher};
pub use snippet::{AuthorSummary, Snippet, SnippetSummary, User};
pub use store::SnippetStore;
pub use vector::{VectorHit, VectorIndex};
