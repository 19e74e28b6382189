//! snipsearch CLI - Access-controlled hybrid snippet search
//!
//! Imports a snippet catalog from JSON, then serves structured and
//! semantic searches over it from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use serde::Deserialize;
use snipsearch::{
    format_results, format_results_json, parse_query_capped, AccessMode, Config, EmbeddingModel,
    FastembedEmbedder, Indexer, NewSnippet, Searcher, SnippetStore, VectorIndex,
};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "snipsearch")]
#[command(author, version, about = "Access-controlled hybrid snippet search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog directory
    #[arg(
        short = 'd',
        long,
        global = true,
        default_value = ".snipsearch",
        env = "SNIPSEARCH_DATA_DIR"
    )]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a catalog from a JSON file of users and snippets
    Import {
        /// Path to the catalog JSON file
        file: PathBuf,

        /// Embedding model to use
        #[arg(long, default_value = "minilm", env = "SNIPSEARCH_MODEL")]
        model: String,
    },

    /// Structured search (+tag -tag @user terms)
    Search {
        /// Search query
        query: String,

        /// Viewer user ID; omit for anonymous
        #[arg(long)]
        viewer: Option<u64>,

        /// Only the viewer's own snippets
        #[arg(long)]
        mine: bool,

        /// Show snippet code in results
        #[arg(short = 'c', long)]
        code: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Semantic search blended with name matches
    Smart {
        /// Search query
        query: String,

        /// Viewer user ID; omit for anonymous
        #[arg(long)]
        viewer: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show popular snippets and tags
    Browse {
        /// Viewer user ID; omit for anonymous
        #[arg(long)]
        viewer: Option<u64>,
    },

    /// Show catalog statistics
    Stats,

    /// List available embedding models
    Models,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Import { file, model } => cmd_import(cli.data_dir, file, model),
        Commands::Search {
            query,
            viewer,
            mine,
            code,
            json,
        } => cmd_search(cli.data_dir, query, viewer, mine, code, json),
        Commands::Smart {
            query,
            viewer,
            json,
        } => cmd_smart(cli.data_dir, query, viewer, json),
        Commands::Browse { viewer } => cmd_browse(cli.data_dir, viewer),
        Commands::Stats => cmd_stats(cli.data_dir),
        Commands::Models => cmd_models(),
    }
}

/// Catalog import format: users first, snippets referring to them by
/// name. `parent` is a 0-based index into the snippets array.
#[derive(Debug, Deserialize)]
struct ImportFile {
    #[serde(default)]
    users: Vec<ImportUser>,
    #[serde(default)]
    snippets: Vec<ImportSnippet>,
}

#[derive(Debug, Deserialize)]
struct ImportUser {
    name: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImportSnippet {
    name: String,
    code: String,
    #[serde(default)]
    description: String,
    owner: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_public")]
    public: bool,
    #[serde(default)]
    permitted: Vec<String>,
    #[serde(default)]
    parent: Option<usize>,
    #[serde(default)]
    liked_by: Vec<String>,
}

fn default_public() -> bool {
    true
}

fn cmd_import(data_dir: PathBuf, file: PathBuf, model: String) -> Result<()> {
    println!("{} {:?}", "Importing".cyan().bold(), file);

    let model: EmbeddingModel = model.parse()?;
    let config = Config::new(data_dir).with_model(model);

    let json = std::fs::read_to_string(&file)?;
    let import: ImportFile = serde_json::from_str(&json)?;

    let mut store = SnippetStore::new();
    let mut user_ids: HashMap<String, u64> = HashMap::new();
    for user in &import.users {
        let id = store.add_user(&user.name, &user.bio, user.avatar.clone())?;
        user_ids.insert(user.name.to_lowercase(), id);
    }

    let embedder = FastembedEmbedder::new(config.model.clone());
    let mut vectors = VectorIndex::new(config.model.dimension())?;
    let indexer = Indexer::new(&embedder);

    let mut snippet_ids: Vec<u64> = Vec::with_capacity(import.snippets.len());
    for entry in &import.snippets {
        let owner_id = lookup_user(&user_ids, &entry.owner)?;
        let permitted: BTreeSet<u64> = entry
            .permitted
            .iter()
            .map(|name| lookup_user(&user_ids, name))
            .collect::<Result<_>>()?;
        let parent_id = match entry.parent {
            Some(index) => Some(*snippet_ids.get(index).ok_or_else(|| {
                anyhow::anyhow!("snippet {:?} refers to undefined parent {}", entry.name, index)
            })?),
            None => None,
        };

        let id = indexer.create_snippet(
            &mut store,
            &mut vectors,
            NewSnippet {
                name: entry.name.clone(),
                code: entry.code.clone(),
                description: entry.description.clone(),
                owner_id,
                parent_id,
                is_public: entry.public,
                tags: entry.tags.iter().cloned().collect(),
                permitted_users: permitted,
            },
        )?;
        for name in &entry.liked_by {
            store.add_like(id, lookup_user(&user_ids, name)?);
        }
        snippet_ids.push(id);
    }

    config.save()?;
    store.save(&config.store_path())?;
    vectors.save(&config.vectors_path())?;

    println!(
        "\n{} Imported {} users, {} snippets ({} embedded)",
        "✓".green(),
        store.user_count(),
        store.snippet_count(),
        vectors.len()
    );

    Ok(())
}

fn lookup_user(user_ids: &HashMap<String, u64>, name: &str) -> Result<u64> {
    user_ids
        .get(&name.to_lowercase())
        .copied()
        .ok_or_else(|| anyhow::anyhow!("unknown user: {}", name))
}

fn load_catalog(data_dir: &PathBuf) -> Result<(Config, SnippetStore, VectorIndex)> {
    let config = Config::load(data_dir)?;
    let store = SnippetStore::load(&config.store_path())?;
    let vectors = VectorIndex::load(&config.vectors_path(), config.model.dimension())?;
    Ok((config, store, vectors))
}

fn cmd_search(
    data_dir: PathBuf,
    query: String,
    viewer: Option<u64>,
    mine: bool,
    code: bool,
    json: bool,
) -> Result<()> {
    let (config, store, vectors) = load_catalog(&data_dir)?;
    let embedder = FastembedEmbedder::new(config.model.clone());
    let searcher = Searcher::new(&store, &vectors, &embedder, &config);

    let mode = if mine {
        AccessMode::OwnerOnly
    } else {
        AccessMode::PublicAndPermitted
    };
    let parsed = parse_query_capped(&query, config.max_query_len);
    let results = searcher.search(&parsed, viewer, mode)?;

    if results.is_empty() {
        println!("No results found for: {}", query.yellow());
        return Ok(());
    }

    if json {
        println!("{}", format_results_json(&results)?);
    } else {
        println!(
            "\n{} results for \"{}\":\n",
            results.len().to_string().green().bold(),
            query.cyan()
        );
        print!("{}", format_results(&results, code));
    }

    Ok(())
}

fn cmd_smart(data_dir: PathBuf, query: String, viewer: Option<u64>, json: bool) -> Result<()> {
    let (config, store, vectors) = load_catalog(&data_dir)?;
    let embedder = FastembedEmbedder::new(config.model.clone());
    let searcher = Searcher::new(&store, &vectors, &embedder, &config);

    let results = searcher.smart_search(&query, viewer)?;

    if results.is_empty() {
        println!("No results found for: {}", query.yellow());
        return Ok(());
    }

    if json {
        println!("{}", format_results_json(&results)?);
    } else {
        println!(
            "\n{} results similar to \"{}\":\n",
            results.len().to_string().green().bold(),
            query.cyan()
        );
        print!("{}", format_results(&results, false));
    }

    Ok(())
}

fn cmd_browse(data_dir: PathBuf, viewer: Option<u64>) -> Result<()> {
    let (config, store, vectors) = load_catalog(&data_dir)?;
    let embedder = FastembedEmbedder::new(config.model.clone());
    let searcher = Searcher::new(&store, &vectors, &embedder, &config);

    println!("{}", "Popular tags".cyan().bold());
    for (tag, count) in searcher.popular_tags(10) {
        println!("  {} ({})", format!("+{}", tag).green(), count);
    }

    println!("\n{}", "Popular snippets".cyan().bold());
    let popular = searcher.popular_snippets(viewer, 10);
    print!("{}", format_results(&popular, false));

    Ok(())
}

fn cmd_stats(data_dir: PathBuf) -> Result<()> {
    let (config, store, vectors) = load_catalog(&data_dir)?;
    let embedder = FastembedEmbedder::new(config.model.clone());
    let searcher = Searcher::new(&store, &vectors, &embedder, &config);
    let stats = searcher.stats();

    println!("{}", "Catalog Statistics".cyan().bold());
    println!("  Users:    {}", stats.users.to_string().green());
    println!("  Snippets: {}", stats.snippets.to_string().green());
    println!("  Embedded: {}", stats.embedded.to_string().green());
    println!("  Model:    {}", stats.model.yellow());

    Ok(())
}

fn cmd_models() -> Result<()> {
    println!("{}", "Available Embedding Models".cyan().bold());
    println!();
    println!("  {} (default)", "minilm".green().bold());
    println!("    Fast, lightweight model (384 dims, ~30MB)");
    println!("    Best for: Quick imports, smaller catalogs");
    println!();
    println!("  {}", "bge".green().bold());
    println!("    High quality retrieval model (384 dims, ~90MB)");
    println!("    Best for: Better semantic understanding");
    println!();
    println!("  {}", "nomic".green().bold());
    println!("    Optimized for code and technical content (768 dims, ~90MB)");
    println!("    Best for: Code-heavy snippet descriptions");
    println!();
    println!("  {}", "multilingual".green().bold());
    println!("    Supports 100+ languages (384 dims, ~470MB)");
    println!("    Best for: Multi-language communities");
    println!();
    println!("Usage: {} --model nomic", "snipsearch import".yellow());

    Ok(())
}
