use std::fs;
use std::io::{self, Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use nex_curate::{
    CurationConfig, CurationPipeline, EmbeddingProvider, HashingEmbedder, NewsItem, RunMode,
    TracingObserver, VectorIndex,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    /// Local feature hashing, no network access
    Hashing,
    /// OpenAI embeddings API (requires the `openai` feature and OPENAI_API_KEY)
    Openai,
}

#[derive(Parser)]
#[command(name = "nex")]
#[command(about = "Deduplicate, rank, and select news items for a digest")]
struct Args {
    /// JSON array of news items, or `-` for stdin
    #[arg(short, long)]
    input: PathBuf,

    /// YAML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Look-back window: `daily` or `weekly` (weekly detects story chains)
    #[arg(short, long, default_value = "daily")]
    mode: RunMode,

    /// Evaluate recency as of this RFC 3339 timestamp instead of now
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = Provider::Hashing)]
    provider: Provider,

    /// Embedding dimensions
    #[arg(long, default_value_t = 384)]
    dimensions: usize,

    /// Base path of a history index; stories already covered there are dropped
    #[arg(long)]
    history: Option<PathBuf>,

    /// Write the curation JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,nex_curate=debug,nex=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn read_items(path: &Path) -> Result<Vec<NewsItem>> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("failed to read items from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read items from {}", path.display()))?
    };
    serde_json::from_str(&raw).context("input is not a JSON array of news items")
}

fn build_provider(provider: Provider, dimensions: usize) -> Result<Arc<dyn EmbeddingProvider>> {
    match provider {
        Provider::Hashing => Ok(Arc::new(HashingEmbedder::new(dimensions)?)),
        #[cfg(feature = "openai")]
        Provider::Openai => {
            let openai =
                nex_curate::OpenAIEmbeddingProvider::from_env()?.with_dimensions(dimensions);
            Ok(Arc::new(openai))
        }
        #[cfg(not(feature = "openai"))]
        Provider::Openai => anyhow::bail!("nex was built without the `openai` feature"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => CurationConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CurationConfig::default(),
    };
    let items = read_items(&args.input)?;
    let provider = build_provider(args.provider, args.dimensions)?;

    let mut builder = CurationPipeline::builder()
        .config(config)
        .embedding_provider(provider.clone())
        .observer(Arc::new(TracingObserver));
    if let Some(path) = &args.history {
        let mut history = VectorIndex::new(provider.dimensions());
        history
            .load(path)
            .with_context(|| format!("failed to load history index {}", path.display()))?;
        builder = builder.history(history);
    }
    let mut pipeline = builder.build()?;

    let now = args.now.unwrap_or_else(Utc::now);
    let curation = pipeline.run_at(items, args.mode, now).await.context("curation run failed")?;

    if let (Some(path), Some(history)) = (&args.history, pipeline.take_history()) {
        history
            .save(path)
            .with_context(|| format!("failed to save history index {}", path.display()))?;
    }

    let json = serde_json::to_string_pretty(&curation)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote curation");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    if curation.top.is_empty() {
        warn!("no stories met the top selection threshold");
    }
    Ok(())
}
