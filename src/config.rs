// Configuration: per-run analysis tunables and process-level settings
// loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmbedderBackend {
    /// Local ONNX all-MiniLM-L6-v2 (default). Run `keystone download-model` first.
    Onnx,
    /// Deterministic feature hashing. No model files, lower quality.
    Hashing,
}

impl FromStr for EmbedderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" => Ok(EmbedderBackend::Onnx),
            "hashing" => Ok(EmbedderBackend::Hashing),
            other => anyhow::bail!("Unknown embedder backend '{other}' (expected onnx or hashing)"),
        }
    }
}

/// Every tunable of a single analysis run.
///
/// Defaults suit crawls of tens to hundreds of pages. All fields can be overridden per
/// run; call `validate()` before handing the config to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Documents with fewer words than this are dropped (default 10)
    pub min_words: usize,
    /// Smallest group HDBSCAN may call a cluster (default 2)
    pub min_cluster_size: usize,
    /// Reduced dimensionality fed to clustering (default 5)
    pub n_components: usize,
    /// Neighbor count for the manifold graph (default 15)
    pub n_neighbors: usize,
    /// Optimization epochs for the manifold layout (default 200)
    pub umap_epochs: usize,
    /// Minimum spacing of points in the layout (default 0.1)
    pub min_dist: f64,
    /// Seed for every randomized step (default 42)
    pub seed: u64,
    /// Keywords kept per topic (default 10)
    pub top_n_keywords: usize,
    /// A candidate more similar than this to a chosen keyword is rejected (default 0.5)
    pub keyword_diversity: f64,
    /// Cosine similarity at which the degenerate-clustering fallback joins
    /// two documents into one topic (default 0.5)
    pub linkage_threshold: f64,
    /// Calibration constant for log-scaled root domain counts (default 24.5)
    pub backlink_scale: f64,
    /// Backlink quality used when domain metrics are unavailable (default 50)
    pub neutral_backlink_quality: f64,
    /// URLs listed per topic (default 3)
    pub sample_urls: usize,
    /// Upper bound on the external metrics fetch, in seconds (default 15)
    pub metrics_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_words: 10,
            min_cluster_size: 2,
            n_components: 5,
            n_neighbors: 15,
            umap_epochs: 200,
            min_dist: 0.1,
            seed: 42,
            top_n_keywords: 10,
            keyword_diversity: 0.5,
            linkage_threshold: 0.5,
            backlink_scale: 24.5,
            neutral_backlink_quality: 50.0,
            sample_urls: 3,
            metrics_timeout_secs: 15,
        }
    }
}

impl AnalysisConfig {
    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics_timeout_secs)
    }

    /// Check every tunable against its documented bounds.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        fn unit(name: &str, v: f64) -> Result<(), AnalysisError> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(AnalysisError::invalid_config(format!(
                    "{name} must be in [0, 1], got {v}"
                )))
            }
        }

        if self.min_words < 1 {
            return Err(AnalysisError::invalid_config("min_words must be >= 1"));
        }
        if self.min_cluster_size < 2 {
            return Err(AnalysisError::invalid_config(format!(
                "min_cluster_size must be >= 2, got {}",
                self.min_cluster_size
            )));
        }
        if self.n_components < 1 {
            return Err(AnalysisError::invalid_config("n_components must be >= 1"));
        }
        if self.n_neighbors < 2 {
            return Err(AnalysisError::invalid_config(format!(
                "n_neighbors must be >= 2, got {}",
                self.n_neighbors
            )));
        }
        if self.umap_epochs < 1 {
            return Err(AnalysisError::invalid_config("umap_epochs must be >= 1"));
        }
        if self.min_dist.is_nan() || self.min_dist < 0.0 {
            return Err(AnalysisError::invalid_config("min_dist must be >= 0"));
        }
        if self.top_n_keywords < 1 {
            return Err(AnalysisError::invalid_config("top_n_keywords must be >= 1"));
        }
        unit("keyword_diversity", self.keyword_diversity)?;
        unit("linkage_threshold", self.linkage_threshold)?;
        if !(self.backlink_scale > 0.0 && self.backlink_scale.is_finite()) {
            return Err(AnalysisError::invalid_config(format!(
                "backlink_scale must be a positive number, got {}",
                self.backlink_scale
            )));
        }
        if !(0.0..=100.0).contains(&self.neutral_backlink_quality) {
            return Err(AnalysisError::invalid_config(format!(
                "neutral_backlink_quality must be in [0, 100], got {}",
                self.neutral_backlink_quality
            )));
        }
        if self.metrics_timeout_secs == 0 {
            return Err(AnalysisError::invalid_config("metrics_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Apply KEYSTONE_* environment overrides on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        override_from_env("KEYSTONE_MIN_WORDS", &mut cfg.min_words)?;
        override_from_env("KEYSTONE_MIN_CLUSTER_SIZE", &mut cfg.min_cluster_size)?;
        override_from_env("KEYSTONE_N_COMPONENTS", &mut cfg.n_components)?;
        override_from_env("KEYSTONE_N_NEIGHBORS", &mut cfg.n_neighbors)?;
        override_from_env("KEYSTONE_SEED", &mut cfg.seed)?;
        override_from_env("KEYSTONE_TOP_N_KEYWORDS", &mut cfg.top_n_keywords)?;
        override_from_env("KEYSTONE_KEYWORD_DIVERSITY", &mut cfg.keyword_diversity)?;
        override_from_env("KEYSTONE_BACKLINK_SCALE", &mut cfg.backlink_scale)?;
        override_from_env("KEYSTONE_METRICS_TIMEOUT_SECS", &mut cfg.metrics_timeout_secs)?;
        Ok(cfg)
    }
}

fn override_from_env<T>(var: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = env::var(var) {
        *slot = raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("{var} has an invalid value: {raw:?}"))?;
    }
    Ok(())
}

/// Process-level configuration loaded from environment variables.
///
/// Secrets come from env vars (never hardcoded). The .env file is loaded
/// at startup via dotenvy.
pub struct Config {
    pub moz_access_id: String,
    pub moz_secret_key: String,
    /// Moz Links API endpoint (defaults to the public v2 url_metrics URL)
    pub moz_api_url: String,
    /// RDAP base URL for domain age lookups. None when KEYSTONE_RDAP_URL
    /// is "off".
    pub rdap_url: Option<String>,
    /// Which embedder to construct (default: Onnx)
    pub embedder_backend: EmbedderBackend,
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
    /// Per-run tunables, already merged with KEYSTONE_* overrides
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let embedder_backend = match env::var("KEYSTONE_EMBEDDER") {
            Ok(raw) => raw.parse()?,
            Err(_) => EmbedderBackend::Onnx,
        };

        let model_dir = env::var("KEYSTONE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::topics::download::default_model_dir());

        Ok(Self {
            moz_access_id: env::var("MOZ_ACCESS_ID").unwrap_or_default(),
            moz_secret_key: env::var("MOZ_SECRET_KEY").unwrap_or_default(),
            moz_api_url: env::var("MOZ_API_URL")
                .unwrap_or_else(|_| crate::scoring::moz::DEFAULT_MOZ_API_URL.to_string()),
            rdap_url: rdap_url_setting(env::var("KEYSTONE_RDAP_URL").ok()),
            embedder_backend,
            model_dir,
            analysis: AnalysisConfig::from_env()?,
        })
    }

    /// True when both Moz credentials are present.
    pub fn has_moz_credentials(&self) -> bool {
        !self.moz_access_id.is_empty() && !self.moz_secret_key.is_empty()
    }

    /// Validate that the chosen embedder backend has what it needs.
    pub fn require_embedder(&self) -> Result<()> {
        match self.embedder_backend {
            EmbedderBackend::Onnx => {
                if !crate::topics::download::embedding_files_present(&self.model_dir) {
                    anyhow::bail!(
                        "Embedding model files not found in {}\n\
                         Run `keystone download-model` to download them.\n\
                         Or set KEYSTONE_EMBEDDER=hashing to run without a model.",
                        self.model_dir.display()
                    );
                }
                Ok(())
            }
            EmbedderBackend::Hashing => Ok(()),
        }
    }
}

/// Default RDAP endpoint unless overridden; "off" disables the lookup.
fn rdap_url_setting(raw: Option<String>) -> Option<String> {
    match raw {
        Some(v) if v.trim().eq_ignore_ascii_case("off") => None,
        Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => Some(crate::scoring::rdap::DEFAULT_RDAP_URL.to_string()),
    }
}
