// Full analysis run: topic discovery and the domain metrics fetch run
// concurrently, then the authority score combines both.
//
// The metrics fetch is the only network I/O. It is bounded by
// `metrics_timeout` and never fails the run; dropping the returned future
// cancels it along with everything else.

use chrono::Utc;
use tracing::{info, warn};

use super::discover::discover_topics;
use crate::config::AnalysisConfig;
use crate::documents::CrawlRecord;
use crate::error::Result;
use crate::output::report::{AnalysisReport, CorpusStats};
use crate::scoring::authority::{recommendations, AuthorityScorer};
use crate::scoring::domain::DomainStructure;
use crate::scoring::metrics::{fetch_domain_metrics, normalize_domain, DomainMetricsProvider};
use crate::topics::traits::Embedder;

/// Analyze one crawl batch for `domain`.
///
/// Fatal conditions (invalid config, no usable documents, embedding
/// failure, out-of-range score) are returned as errors. Degraded ones
/// (missing metrics, degenerate clustering) complete the run and show up
/// in the report's warnings and stats.
pub async fn analyze(
    records: &[CrawlRecord],
    domain: &str,
    config: &AnalysisConfig,
    embedder: &dyn Embedder,
    metrics_provider: &dyn DomainMetricsProvider,
) -> Result<AnalysisReport> {
    config.validate()?;
    let domain = normalize_domain(domain);
    let domain_structure = DomainStructure::parse(&domain);

    info!(
        domain = %domain,
        tld_category = %domain_structure.tld_category,
        records = records.len(),
        seed = config.seed,
        "Starting topical authority analysis"
    );

    let (metrics, discovery) = tokio::join!(
        fetch_domain_metrics(metrics_provider, &domain, config.metrics_timeout()),
        discover_topics(records, config, embedder),
    );
    let discovery = discovery?;

    if let Some(fallback) = discovery.clustering.fallback {
        warn!(domain = %domain, fallback = %fallback, "Clustering took a fallback path");
    }

    let authority = AuthorityScorer::from_config(config).score(&discovery.consistency, &metrics)?;
    let recommendations = recommendations(&authority, discovery.topics.len(), metrics.metrics());

    let stats = CorpusStats {
        total_documents: discovery.documents.len(),
        dropped_documents: discovery.dropped,
        total_topics: discovery.clustering.cluster_count(),
        outliers: discovery.clustering.noise_count(),
        fallback: discovery.clustering.fallback,
    };

    info!(
        domain = %domain,
        final_score = authority.final_score,
        grade = %authority.grade,
        topics = stats.total_topics,
        warnings = authority.warnings.len(),
        "Analysis complete"
    );

    Ok(AnalysisReport {
        domain,
        domain_structure,
        analyzed_at: Utc::now(),
        authority,
        topics: discovery.topics,
        stats,
        recommendations,
    })
}
