use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use keystone::config::{Config, EmbedderBackend};
use keystone::documents::CrawlRecord;
use keystone::scoring::domain::DomainStructure;
use keystone::scoring::metrics::{
    normalize_domain, DomainMetricsProvider, MergedMetricsProvider, NoMetrics, StaticMetricsProvider,
};
use keystone::scoring::moz::MozClient;
use keystone::scoring::rdap::RdapClient;
use keystone::topics::traits::Embedder;

/// Keystone: topical authority analysis for crawled websites.
///
/// Discovers the topics a site writes about, measures how focused and
/// coherent that coverage is, and combines it with backlink metrics into a
/// single explainable score.
#[derive(Parser)]
#[command(name = "keystone", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a crawl export (JSON array of {url, text} records)
    Analyze {
        /// Path to the crawl export
        pages: PathBuf,

        /// Domain the pages belong to (URL or bare host)
        #[arg(long)]
        domain: String,

        /// Use metrics from a JSON file instead of the Moz API
        #[arg(long)]
        metrics_file: Option<PathBuf>,

        /// Embedding backend: onnx or hashing (default: KEYSTONE_EMBEDDER or onnx)
        #[arg(long)]
        embedder: Option<EmbedderBackend>,

        /// Write the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Seed for the manifold layout
        #[arg(long)]
        seed: Option<u64>,

        /// Smallest group that counts as a topic
        #[arg(long)]
        min_cluster_size: Option<usize>,

        /// Keywords kept per topic
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Download the sentence embedding model (~90 MB)
    DownloadModel,

    /// Fetch and print domain metrics (Moz and RDAP) for a domain
    Metrics {
        /// Domain to look up (URL or bare host)
        domain: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keystone=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            pages,
            domain,
            metrics_file,
            embedder,
            output,
            seed,
            min_cluster_size,
            top_n,
        } => {
            let mut config = Config::load()?;
            if let Some(backend) = embedder {
                config.embedder_backend = backend;
            }
            if let Some(seed) = seed {
                config.analysis.seed = seed;
            }
            if let Some(size) = min_cluster_size {
                config.analysis.min_cluster_size = size;
            }
            if let Some(n) = top_n {
                config.analysis.top_n_keywords = n;
            }
            config.require_embedder()?;

            let records = load_records(&pages)?;
            println!("Analyzing {} pages for {}...", records.len(), domain.bold());

            let embedder = create_embedder(&config)?;
            let provider = create_metrics_provider(&config, metrics_file.as_deref())?;

            let report = keystone::pipeline::analyze::analyze(
                &records,
                &domain,
                &config.analysis,
                embedder.as_ref(),
                provider.as_ref(),
            )
            .await?;

            keystone::output::terminal::display_report(&report);

            if let Some(path) = output {
                report.write_json(&path)?;
                println!("Report written to {}", path.display());
            }
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading embedding model...");
            println!("  Destination: {}", model_dir.display());

            keystone::topics::download::download_model(model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `keystone analyze <pages.json> --domain <domain>`.");
        }

        Commands::Metrics { domain } => {
            let config = Config::load()?;
            let provider = create_metrics_provider(&config, None)?;
            let domain = normalize_domain(&domain);
            let structure = DomainStructure::parse(&domain);
            let metrics = provider.get_domain_metrics(&domain).await?;

            keystone::output::terminal::display_domain_metrics(&domain, &structure, metrics.as_ref());
        }
    }

    Ok(())
}

/// Read a crawl export: a JSON array of `{url, text}` records.
fn load_records(path: &std::path::Path) -> Result<Vec<CrawlRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read crawl export {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse crawl export {}", path.display()))
}

/// Create the embedder for the configured backend.
fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    match config.embedder_backend {
        EmbedderBackend::Onnx => {
            info!("Using local ONNX sentence embedder");
            let dir = keystone::topics::download::embedding_model_dir(&config.model_dir);
            let embedder = keystone::topics::embeddings::OnnxEmbedder::load(&dir)?;
            Ok(Box::new(embedder))
        }
        EmbedderBackend::Hashing => {
            info!("Using feature-hashing embedder");
            Ok(Box::new(keystone::topics::hashing::HashingEmbedder::default()))
        }
    }
}

/// Pick the metrics source. An explicit file is used alone. Otherwise Moz
/// (when credentials are set) and RDAP (unless disabled) are combined.
fn create_metrics_provider(
    config: &Config,
    metrics_file: Option<&std::path::Path>,
) -> Result<Box<dyn DomainMetricsProvider>> {
    if let Some(path) = metrics_file {
        info!(path = %path.display(), "Using domain metrics from file");
        return Ok(Box::new(StaticMetricsProvider::from_file(path)?));
    }

    let moz: Option<Box<dyn DomainMetricsProvider>> = if config.has_moz_credentials() {
        Some(Box::new(MozClient::new(
            &config.moz_api_url,
            &config.moz_access_id,
            &config.moz_secret_key,
        )?))
    } else {
        None
    };
    let rdap: Option<Box<dyn DomainMetricsProvider>> = match &config.rdap_url {
        Some(url) => Some(Box::new(RdapClient::new(url)?)),
        None => None,
    };

    match (moz, rdap) {
        (Some(moz), Some(rdap)) => {
            info!("Using Moz API for backlinks and RDAP for domain age");
            Ok(Box::new(MergedMetricsProvider::new(moz, rdap)))
        }
        (Some(moz), None) => {
            info!("Using Moz API for domain metrics; RDAP disabled");
            Ok(moz)
        }
        (None, Some(rdap)) => {
            warn!("No Moz credentials; backlink quality will be neutral, domain age from RDAP");
            Ok(rdap)
        }
        (None, None) => {
            warn!("No Moz credentials and RDAP disabled; backlink quality will be neutral");
            Ok(Box::new(NoMetrics))
        }
    }
}
