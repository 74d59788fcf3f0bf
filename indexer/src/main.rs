use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use newsdex_core::builder::build_from_store;
use newsdex_core::cache::{CacheConfig, IndexCache};
use newsdex_core::docstore::{content_id, DocumentStore, SledDocumentStore};
use newsdex_core::persist::{self, IndexPaths, MetaFile};
use newsdex_core::store::{LocalOnlyStore, RedisStore, SharedStore};
use newsdex_core::NewsRecord;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One article as delivered by the news feed (GNews-style JSON).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedArticle {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    source: Option<FeedSource>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedSource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl From<FeedArticle> for NewsRecord {
    fn from(a: FeedArticle) -> Self {
        let published_at = a.published_at.unwrap_or_default();
        let id = a.id.unwrap_or_else(|| content_id(&a.title, &published_at));
        let source = a.source.unwrap_or_default();
        NewsRecord {
            id,
            title: a.title,
            description: a.description.unwrap_or_default(),
            content: a.content.unwrap_or_default(),
            url: a.url.unwrap_or_default(),
            published_at,
            source_name: source.name.unwrap_or_default(),
            source_url: source.url.unwrap_or_default(),
        }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Ingest news articles and manage the positional index", long_about = None)]
struct Cli {
    /// Data directory holding the document store and index files
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import articles from JSON/JSONL files or a directory into the document store
    Import {
        #[arg(long)]
        input: PathBuf,
    },
    /// Build the raw positional index from every stored article
    Build,
    /// Compress the raw index into the msgpack artifact
    Optimize,
    /// Merge case variants of index terms into a separate file
    Normalize,
    /// Recompress the raw index into the artifact, then evict and re-upload the shared cache
    /// copy. The artifact is always rebuilt, with or without a redis url.
    Reset {
        #[arg(long, env = "REDIS_URL")]
        redis_url: Option<String>,
        /// Connect/read/write timeout for the shared cache store
        #[arg(long, default_value_t = 5)]
        redis_timeout_secs: u64,
    },
    /// Print index metadata
    Stats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let paths = IndexPaths::new(&cli.data_dir);

    match cli.command {
        Commands::Import { input } => import(&paths, &input),
        Commands::Build => build_index(&paths),
        Commands::Optimize => optimize(&paths),
        Commands::Normalize => normalize(&paths),
        Commands::Reset { redis_url, redis_timeout_secs } => {
            let store: Option<Arc<dyn SharedStore>> = match redis_url {
                Some(url) => {
                    Some(Arc::new(RedisStore::open(&url)?.with_timeout(Duration::from_secs(redis_timeout_secs))))
                }
                None => None,
            };
            reset(&paths, store)
        }
        Commands::Stats => stats(&paths),
    }
}

fn input_files(input: &Path) -> Vec<PathBuf> {
    if input.is_file() {
        return vec![input.to_path_buf()];
    }
    WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect()
}

/// Accepts a single article, an array of articles, or a feed page `{"articles": [..]}`.
fn articles_from_value(json: serde_json::Value) -> Result<Vec<FeedArticle>> {
    match json {
        serde_json::Value::Array(items) => {
            Ok(items.into_iter().map(serde_json::from_value).collect::<Result<Vec<_>, _>>()?)
        }
        serde_json::Value::Object(mut obj) => match obj.remove("articles") {
            Some(articles) => articles_from_value(articles),
            None => Ok(vec![serde_json::from_value(serde_json::Value::Object(obj))?]),
        },
        _ => Ok(Vec::new()),
    }
}

fn read_articles(file: &Path) -> Result<Vec<FeedArticle>> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("open {}", file.display()))?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    } else {
        articles_from_value(serde_json::from_reader(reader)?)
    }
}

fn import(paths: &IndexPaths, input: &Path) -> Result<()> {
    let store = SledDocumentStore::open(paths.documents())?;
    let (mut inserted, mut duplicates) = (0usize, 0usize);
    for file in input_files(input) {
        for article in read_articles(&file)? {
            if store.insert(article.into())? {
                inserted += 1;
            } else {
                duplicates += 1;
            }
        }
    }
    store.flush()?;
    tracing::info!(inserted, duplicates, total = store.len()?, "import complete");
    Ok(())
}

fn build_index(paths: &IndexPaths) -> Result<()> {
    let store = SledDocumentStore::open(paths.documents())?;
    let out = build_from_store(&store)?;
    persist::save_raw_index(&paths.raw_index(), &out.index)?;
    let meta = MetaFile {
        num_docs: out.num_docs(),
        num_terms: out.index.term_count(),
        avg_doc_length: out.avg_doc_length,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: 1,
    };
    persist::save_meta(paths, &meta)?;
    tracing::info!(path = %paths.raw_index().display(), num_docs = meta.num_docs, "index build complete");
    Ok(())
}

fn optimize(paths: &IndexPaths) -> Result<()> {
    let report = persist::optimize_index(&paths.raw_index(), &paths.artifact())?;
    println!(
        "{} terms, {} documents, {} -> {} bytes ({:.2}x) in {:.2}s",
        report.terms,
        report.documents,
        report.raw_bytes,
        report.artifact_bytes,
        report.ratio(),
        report.elapsed_secs
    );
    Ok(())
}

fn normalize(paths: &IndexPaths) -> Result<()> {
    let output = paths.normalized_index();
    let report = persist::normalize_index_file(&paths.raw_index(), &output)?;
    println!(
        "{} terms -> {} terms ({} merged), written to {}",
        report.original_terms,
        report.normalized_terms,
        report.reduction(),
        output.display()
    );
    println!("the serving tiers still read {}; replace it and run `optimize` then `reset` to serve the merged index", paths.raw_index().display());
    Ok(())
}

fn reset(paths: &IndexPaths, store: Option<Arc<dyn SharedStore>>) -> Result<()> {
    persist::optimize_index(&paths.raw_index(), &paths.artifact())?;
    let Some(store) = store else {
        tracing::warn!("no redis url configured; refreshed the local artifact only");
        return Ok(());
    };
    let cache = IndexCache::new(CacheConfig::new(paths.clone()), store);
    cache.reset()?;
    tracing::info!(in_store = cache.is_in_store()?, "shared cache copy refreshed");
    Ok(())
}

/// Reads the serving tiers from local disk only; the shared store is not consulted.
fn stats(paths: &IndexPaths) -> Result<()> {
    match persist::load_meta(paths) {
        Ok(meta) => println!("{}", serde_json::to_string_pretty(&meta)?),
        Err(e) => tracing::warn!(error = %e, "no index metadata; run `build` first"),
    }
    let cache = IndexCache::new(CacheConfig::new(paths.clone()), Arc::new(LocalOnlyStore));
    println!("{}", serde_json::to_string_pretty(&cache.get_index().stats())?);
    Ok(())
}
