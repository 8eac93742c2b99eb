// External domain metrics: the provider seam, offline providers, and the
// timed fetch the pipeline runs alongside topic discovery.
//
// A provider answering "no data" is not an error. Neither is a provider
// that fails or times out: the run continues with a neutral backlink
// quality and a "partial data" warning.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Authority and backlink metrics for one domain. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainMetrics {
    /// 0..=100
    pub domain_authority: Option<f64>,
    /// 0..=100
    pub page_authority: Option<f64>,
    /// 0..=100
    pub spam_score: Option<f64>,
    pub root_domains_linking: Option<u64>,
    pub external_links: Option<u64>,
    pub domain_age_years: Option<f64>,
}

impl DomainMetrics {
    /// Fill this record's gaps from `other`. Fields already present win.
    pub fn merge(self, other: DomainMetrics) -> DomainMetrics {
        DomainMetrics {
            domain_authority: self.domain_authority.or(other.domain_authority),
            page_authority: self.page_authority.or(other.page_authority),
            spam_score: self.spam_score.or(other.spam_score),
            root_domains_linking: self.root_domains_linking.or(other.root_domains_linking),
            external_links: self.external_links.or(other.external_links),
            domain_age_years: self.domain_age_years.or(other.domain_age_years),
        }
    }
}

#[async_trait]
pub trait DomainMetricsProvider: Send + Sync {
    /// Metrics for `domain` (already normalized), or `Ok(None)` when the
    /// provider has nothing for it.
    async fn get_domain_metrics(&self, domain: &str) -> Result<Option<DomainMetrics>>;
}

/// Provider that never has data. Runs score with neutral backlink quality.
pub struct NoMetrics;

#[async_trait]
impl DomainMetricsProvider for NoMetrics {
    async fn get_domain_metrics(&self, _domain: &str) -> Result<Option<DomainMetrics>> {
        Ok(None)
    }
}

/// Provider backed by metrics supplied up front (CLI `--metrics-file`,
/// tests). Answers the same record for every domain.
pub struct StaticMetricsProvider {
    metrics: DomainMetrics,
}

impl StaticMetricsProvider {
    pub fn new(metrics: DomainMetrics) -> Self {
        Self { metrics }
    }

    /// Read a JSON `DomainMetrics` object from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metrics file {}", path.display()))?;
        let metrics: DomainMetrics = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse metrics file {}", path.display()))?;
        Ok(Self::new(metrics))
    }
}

#[async_trait]
impl DomainMetricsProvider for StaticMetricsProvider {
    async fn get_domain_metrics(&self, _domain: &str) -> Result<Option<DomainMetrics>> {
        Ok(Some(self.metrics.clone()))
    }
}

/// Two providers queried concurrently, their answers merged field by field.
///
/// Typically Moz (authority and backlinks) as primary and RDAP (domain age)
/// as secondary. One side failing degrades to the other side's answer; only
/// both failing is an error.
pub struct MergedMetricsProvider {
    primary: Box<dyn DomainMetricsProvider>,
    secondary: Box<dyn DomainMetricsProvider>,
}

impl MergedMetricsProvider {
    pub fn new(primary: Box<dyn DomainMetricsProvider>, secondary: Box<dyn DomainMetricsProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl DomainMetricsProvider for MergedMetricsProvider {
    async fn get_domain_metrics(&self, domain: &str) -> Result<Option<DomainMetrics>> {
        let (primary, secondary) = tokio::join!(
            self.primary.get_domain_metrics(domain),
            self.secondary.get_domain_metrics(domain)
        );

        let (primary, secondary) = match (primary, secondary) {
            (Err(p), Err(s)) => return Err(p.context(format!("secondary metrics source also failed: {s:#}"))),
            (Err(e), other) => {
                warn!(domain, error = %e, "Primary metrics source failed, using secondary only");
                (None, other?)
            }
            (other, Err(e)) => {
                warn!(domain, error = %e, "Secondary metrics source failed, using primary only");
                (other?, None)
            }
            (Ok(p), Ok(s)) => (p, s),
        };

        Ok(match (primary, secondary) {
            (Some(p), Some(s)) => Some(p.merge(s)),
            (p, s) => p.or(s),
        })
    }
}

/// Outcome of the metrics fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsStatus {
    Available(DomainMetrics),
    /// Why nothing usable came back.
    Unavailable(String),
}

impl MetricsStatus {
    pub fn metrics(&self) -> Option<&DomainMetrics> {
        match self {
            MetricsStatus::Available(m) => Some(m),
            MetricsStatus::Unavailable(_) => None,
        }
    }
}

/// Ask `provider` for `domain`'s metrics, giving up after `timeout`.
///
/// Never fails: errors, timeouts and empty answers all become
/// `MetricsStatus::Unavailable` with a warn-level log.
pub async fn fetch_domain_metrics(
    provider: &dyn DomainMetricsProvider,
    domain: &str,
    timeout: Duration,
) -> MetricsStatus {
    let domain = normalize_domain(domain);

    match tokio::time::timeout(timeout, provider.get_domain_metrics(&domain)).await {
        Ok(Ok(Some(metrics))) => {
            info!(
                domain = %domain,
                domain_authority = ?metrics.domain_authority,
                spam_score = ?metrics.spam_score,
                root_domains = ?metrics.root_domains_linking,
                "Fetched domain metrics"
            );
            MetricsStatus::Available(metrics)
        }
        Ok(Ok(None)) => {
            warn!(domain = %domain, "No domain metrics available");
            MetricsStatus::Unavailable(format!("no metrics for {domain}"))
        }
        Ok(Err(e)) => {
            warn!(domain = %domain, error = %e, "Domain metrics request failed");
            MetricsStatus::Unavailable(format!("metrics request failed: {e}"))
        }
        Err(_) => {
            warn!(
                domain = %domain,
                timeout_secs = timeout.as_secs_f64(),
                "Domain metrics request timed out"
            );
            MetricsStatus::Unavailable(format!(
                "metrics request timed out after {}s",
                timeout.as_secs_f64()
            ))
        }
    }
}

/// Reduce a URL or host to the bare registrable domain used for lookups.
///
/// `https://www.Example.com:8080/blog?x=1` becomes `example.com`.
pub fn normalize_domain(input: &str) -> String {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("");
    // Drop credentials and port
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    let host = host.trim_end_matches('.').to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}
