use anyhow::Result;
use clap::Parser;
use newsdex_core::cache::{CacheConfig, IndexCache};
use newsdex_core::docstore::SledDocumentStore;
use newsdex_core::persist::IndexPaths;
use newsdex_core::search::SearchEngine;
use newsdex_core::store::{LocalOnlyStore, RedisStore, SharedStore};
use server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Data directory holding the document store and index files
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Shared cache store; without it the local artifact is the first tier after memory
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,
    /// Connect/read/write timeout for the shared cache store
    #[arg(long, default_value_t = 5)]
    redis_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let paths = IndexPaths::new(&args.data_dir);

    let shared: Arc<dyn SharedStore> = match &args.redis_url {
        Some(url) => Arc::new(RedisStore::open(url)?.with_timeout(Duration::from_secs(args.redis_timeout_secs))),
        None => {
            tracing::warn!("REDIS_URL not set; running without a shared cache store");
            Arc::new(LocalOnlyStore)
        }
    };
    let documents = Arc::new(SledDocumentStore::open(paths.documents())?);
    let cache = Arc::new(IndexCache::new(CacheConfig::new(paths), shared));

    let warm = Arc::clone(&cache);
    tokio::task::spawn_blocking(move || warm.warm()).await?;

    let engine = Arc::new(SearchEngine::new(cache, documents));
    let app = build_app(engine);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
