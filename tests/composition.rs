// Composition tests: the full analysis run end to end.
//
// These exercise the data flow between modules:
//   preprocess -> embed -> reduce -> cluster -> keywords -> consistency -> authority
// using the feature-hashing embedder and offline metrics providers, so no
// model files or network access are needed.

use anyhow::Result;
use async_trait::async_trait;

use keystone::config::AnalysisConfig;
use keystone::documents::CrawlRecord;
use keystone::error::AnalysisError;
use keystone::pipeline::analyze::analyze;
use keystone::pipeline::discover::discover_topics;
use keystone::scoring::authority::Grade;
use keystone::scoring::domain::TldCategory;
use keystone::scoring::metrics::{
    DomainMetrics, DomainMetricsProvider, MergedMetricsProvider, NoMetrics, StaticMetricsProvider,
};
use keystone::topics::cluster::FallbackKind;
use keystone::topics::hashing::HashingEmbedder;

fn record(url: &str, text: &str) -> CrawlRecord {
    CrawlRecord {
        url: url.to_string(),
        text: text.to_string(),
    }
}

fn calibration_metrics() -> DomainMetrics {
    DomainMetrics {
        domain_authority: Some(93.0),
        page_authority: Some(70.0),
        spam_score: Some(1.0),
        root_domains_linking: Some(5287),
        external_links: Some(120_000),
        domain_age_years: Some(10.0),
    }
}

/// Three pages with no vocabulary in common.
fn unrelated_pages() -> Vec<CrawlRecord> {
    vec![
        record(
            "https://example.com/sourdough",
            "Sourdough starter hydration determines crumb structure; bakers adjust flour ratios, \
             fermentation temperature and proofing baskets before scoring each loaf.",
        ),
        record(
            "https://example.com/kubernetes",
            "Kubernetes autoscaling watches container utilization, schedules replica pods across \
             worker nodes and rebalances deployments whenever cluster capacity changes.",
        ),
        record(
            "https://example.com/telescopes",
            "Amateur astronomers collimate reflector telescopes, track nebulae through eyepieces \
             and photograph galaxies using equatorial mounts under dark skies.",
        ),
    ]
}

/// Three pages that differ only in their final word.
fn near_duplicate_pages() -> Vec<CrawlRecord> {
    let body = "Sourdough starter hydration determines crumb structure; bakers adjust flour ratios, \
                fermentation temperature, levain timing, banneton proofing, lame scoring and \
                steam injection for every crusty";
    ["loaf", "boule", "batard"]
        .iter()
        .enumerate()
        .map(|(i, last)| record(&format!("https://example.com/bread-{i}"), &format!("{body} {last}")))
        .collect()
}

/// Twelve pages over three themes.
fn themed_corpus() -> Vec<CrawlRecord> {
    let themes = [
        (
            "bread",
            "sourdough starter hydration crumb flour fermentation levain banneton proofing loaf",
        ),
        (
            "k8s",
            "kubernetes container pods replica deployment autoscaling scheduler nodes cluster ingress",
        ),
        (
            "sky",
            "telescope astronomers nebula galaxies eyepiece reflector collimation mount observatory",
        ),
    ];
    let mut records = Vec::new();
    for (slug, vocabulary) in themes {
        let words: Vec<&str> = vocabulary.split_whitespace().collect();
        for i in 0..4 {
            // Rotate the vocabulary so pages within a theme overlap heavily
            // without being identical.
            let rotated: Vec<&str> = words.iter().cycle().skip(i).take(words.len()).copied().collect();
            records.push(record(
                &format!("https://example.com/{slug}/{i}"),
                &format!("Guide {i}: {}", rotated.join(" ")),
            ));
        }
    }
    records
}

// ============================================================
// Degenerate corpora
// ============================================================

#[tokio::test]
async fn unrelated_pages_score_low_consistency() {
    let report = analyze(
        &unrelated_pages(),
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap();

    assert_eq!(report.stats.fallback, Some(FallbackKind::NoDenseCluster));
    assert_eq!(report.topics.len(), 3);
    assert!(report.authority.topical_consistency < 50.0);
    assert!(report.authority.final_score < 50.0);
    assert_eq!(report.authority.grade, Grade::F);
}

#[tokio::test]
async fn near_duplicates_score_high_consistency() {
    let report = analyze(
        &near_duplicate_pages(),
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap();

    assert_eq!(report.topics.len(), 1);
    assert_eq!(report.topics[0].size, 3);
    assert!(report.authority.topical_consistency > 90.0);
    assert!(report.authority.semantic_relevance > 80.0);
}

#[tokio::test]
async fn tiny_corpus_is_a_single_topic() {
    let records = vec![
        record("https://example.com/a", "Sourdough starter hydration shapes the crumb of every rustic loaf we bake"),
        record("https://example.com/b", "Kubernetes autoscaling schedules replica pods across worker nodes in the cluster"),
    ];
    let report = analyze(
        &records,
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap();

    assert_eq!(report.stats.fallback, Some(FallbackKind::TinyCorpus));
    assert_eq!(report.stats.total_topics, 1);
    assert_eq!(report.topics[0].size, 2);
    assert_eq!(report.authority.topical_consistency, 100.0);
}

#[tokio::test]
async fn single_document_completes() {
    let records = vec![record(
        "https://example.com/only",
        "Sourdough starter hydration shapes the crumb of every rustic loaf we bake",
    )];
    let report = analyze(
        &records,
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap();

    assert_eq!(report.stats.total_documents, 1);
    assert_eq!(report.topics.len(), 1);
    // A lone page has no pairs to agree with
    assert_eq!(report.authority.semantic_relevance, 0.0);
}

// ============================================================
// Fatal conditions
// ============================================================

#[tokio::test]
async fn empty_input_is_an_error() {
    let err = analyze(
        &[],
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AnalysisError::Input { dropped: 0, min_words: 10 }));
}

#[tokio::test]
async fn all_short_pages_is_an_error() {
    let records = vec![record("https://example.com/a", "too short"), record("", "also short")];
    let err = analyze(
        &records,
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AnalysisError::Input { dropped: 2, .. }));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_work() {
    let config = AnalysisConfig {
        min_cluster_size: 1,
        ..AnalysisConfig::default()
    };
    let err = analyze(
        &themed_corpus(),
        "example.com",
        &config,
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AnalysisError::InvalidConfig(_)));
}

// ============================================================
// Full corpus properties
// ============================================================

#[tokio::test]
async fn every_document_is_labeled() {
    let records = themed_corpus();
    let discovery = discover_topics(&records, &AnalysisConfig::default(), &HashingEmbedder::default())
        .await
        .unwrap();

    assert_eq!(discovery.clustering.labels.len(), records.len());
    assert!(discovery.clustering.labels.iter().all(|&l| l >= -1));

    let clustered: usize = discovery.topics.iter().map(|t| t.size).sum();
    assert_eq!(clustered + discovery.clustering.noise_count(), records.len());
    assert!(discovery.documents.iter().all(|d| d.is_embedded()));
}

#[tokio::test]
async fn scores_stay_in_range() {
    let report = analyze(
        &themed_corpus(),
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &StaticMetricsProvider::new(calibration_metrics()),
    )
    .await
    .unwrap();

    let a = &report.authority;
    for component in [a.semantic_relevance, a.topical_consistency, a.backlink_quality, a.final_score] {
        assert!((0.0..=100.0).contains(&component), "out of range: {component}");
    }
    assert!((0.0..=10.0).contains(&a.domain_age_bonus));
    assert_eq!(a.grade, Grade::from_score(a.final_score));
}

#[tokio::test]
async fn topics_are_sorted_and_bounded() {
    let config = AnalysisConfig::default();
    let report = analyze(
        &themed_corpus(),
        "example.com",
        &config,
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap();

    for pair in report.topics.windows(2) {
        assert!(pair[0].size >= pair[1].size);
    }
    for topic in &report.topics {
        assert!(topic.keywords.len() <= config.top_n_keywords);
        assert!(topic.sample_urls.len() <= config.sample_urls);
        assert!(topic.representative_text.chars().count() <= 203);
    }
}

#[tokio::test]
async fn fixed_seed_is_deterministic() {
    let config = AnalysisConfig {
        seed: 7,
        ..AnalysisConfig::default()
    };
    let embedder = HashingEmbedder::default();
    let provider = StaticMetricsProvider::new(calibration_metrics());

    let first = analyze(&themed_corpus(), "example.com", &config, &embedder, &provider)
        .await
        .unwrap();
    let second = analyze(&themed_corpus(), "example.com", &config, &embedder, &provider)
        .await
        .unwrap();

    assert_eq!(first.topics, second.topics);
    assert_eq!(first.authority, second.authority);
    assert_eq!(first.stats, second.stats);
}

// ============================================================
// Metrics handling
// ============================================================

#[tokio::test]
async fn calibration_metrics_flow_into_the_score() {
    let report = analyze(
        &near_duplicate_pages(),
        "https://www.Example.com/blog",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &StaticMetricsProvider::new(calibration_metrics()),
    )
    .await
    .unwrap();

    assert_eq!(report.domain, "example.com");
    assert!((report.authority.backlink_quality - 93.47).abs() < 0.05);
    assert_eq!(report.authority.domain_age_bonus, 10.0);
    assert!(report.authority.warnings.is_empty());
}

#[tokio::test]
async fn backlinks_and_registration_age_from_separate_sources() {
    let backlinks = DomainMetrics {
        domain_age_years: None,
        ..calibration_metrics()
    };
    let age = DomainMetrics {
        domain_age_years: Some(3.0),
        ..DomainMetrics::default()
    };
    let provider = MergedMetricsProvider::new(
        Box::new(StaticMetricsProvider::new(backlinks)),
        Box::new(StaticMetricsProvider::new(age)),
    );

    let report = analyze(
        &near_duplicate_pages(),
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &provider,
    )
    .await
    .unwrap();

    assert!((report.authority.backlink_quality - 93.47).abs() < 0.05);
    assert_eq!(report.authority.domain_age_bonus, 6.0);
    assert!(report.authority.warnings.is_empty(), "{:?}", report.authority.warnings);
}

#[tokio::test]
async fn failed_age_source_keeps_backlinks_and_warns_about_age() {
    let backlinks = DomainMetrics {
        domain_age_years: None,
        ..calibration_metrics()
    };
    let provider = MergedMetricsProvider::new(
        Box::new(StaticMetricsProvider::new(backlinks)),
        Box::new(FailingProvider),
    );

    let report = analyze(
        &near_duplicate_pages(),
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &provider,
    )
    .await
    .unwrap();

    assert!((report.authority.backlink_quality - 93.47).abs() < 0.05);
    assert_eq!(report.authority.domain_age_bonus, 0.0);
    assert!(report
        .authority
        .warnings
        .iter()
        .any(|w| w.contains("domain age unknown")));
}

#[tokio::test]
async fn missing_metrics_leave_a_partial_data_warning() {
    let report = analyze(
        &near_duplicate_pages(),
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap();

    assert_eq!(report.authority.backlink_quality, 50.0);
    assert_eq!(report.authority.domain_age_bonus, 0.0);
    assert!(report
        .authority
        .warnings
        .iter()
        .any(|w| w.starts_with("partial data")));
}

struct FailingProvider;

#[async_trait]
impl DomainMetricsProvider for FailingProvider {
    async fn get_domain_metrics(&self, _domain: &str) -> Result<Option<DomainMetrics>> {
        anyhow::bail!("503 Service Unavailable")
    }
}

#[tokio::test]
async fn provider_failure_does_not_fail_the_run() {
    let report = analyze(
        &near_duplicate_pages(),
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &FailingProvider,
    )
    .await
    .unwrap();

    assert_eq!(report.authority.backlink_quality, 50.0);
    assert!(report.authority.warnings[0].contains("503"));
}

#[tokio::test]
async fn report_serializes_to_json() {
    let report = analyze(
        &near_duplicate_pages(),
        "example.com",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &StaticMetricsProvider::new(calibration_metrics()),
    )
    .await
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["domain"], "example.com");
    assert!(json["authority"]["grade"].is_string());
    assert_eq!(json["topics"].as_array().map(Vec::len), Some(1));
    assert!(json["stats"]["fallback"].is_string());
}

#[tokio::test]
async fn report_carries_domain_structure() {
    let report = analyze(
        &near_duplicate_pages(),
        "https://blog.example.co.uk/posts",
        &AnalysisConfig::default(),
        &HashingEmbedder::default(),
        &NoMetrics,
    )
    .await
    .unwrap();

    assert_eq!(report.domain, "blog.example.co.uk");
    assert_eq!(report.domain_structure.registrable_domain(), "example.co.uk");
    assert!(report.domain_structure.is_subdomain);
    assert_eq!(report.domain_structure.tld_category, TldCategory::CountryCode);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["domain_structure"]["tld_category"], "country_code");
    assert_eq!(json["domain_structure"]["suffix"], "co.uk");
}
