// Unit tests for topic discovery building blocks.
//
// Tests isolated pure functions: candidate_phrases ordering and filtering,
// topical_consistency and semantic_relevance edge cases, the cluster
// engine's fallback paths, and the manifold reducer's output shape.

use keystone::topics::cluster::{ClusterEngine, FallbackKind};
use keystone::topics::consistency::{semantic_relevance, topical_consistency};
use keystone::topics::hdbscan::{Hdbscan, NOISE};
use keystone::topics::keywords::candidate_phrases;
use keystone::topics::reduce::ManifoldReducer;
use keystone::topics::tfidf::representative_terms;

fn engine() -> ClusterEngine {
    ClusterEngine {
        min_cluster_size: 2,
        linkage_threshold: 0.5,
    }
}

fn reducer(seed: u64) -> ManifoldReducer {
    ManifoldReducer {
        n_components: 2,
        n_neighbors: 5,
        min_dist: 0.1,
        epochs: 100,
        seed,
    }
}

/// Two tight groups of five points, far apart along the first axis.
fn two_groups() -> Vec<Vec<f64>> {
    let mut points = Vec::new();
    for i in 0..5 {
        let jitter = i as f64 * 0.01;
        points.push(vec![1.0, jitter, 0.0, 0.0]);
    }
    for i in 0..5 {
        let jitter = i as f64 * 0.01;
        points.push(vec![0.0, 0.0, 1.0, jitter]);
    }
    points
}

// ============================================================
// candidate_phrases
// ============================================================

#[test]
fn candidates_empty_input() {
    assert!(candidate_phrases(&[]).is_empty());
    assert!(candidate_phrases(&[""]).is_empty());
}

#[test]
fn candidates_are_lowercase_and_distinct() {
    let phrases = candidate_phrases(&["Sourdough Starter", "sourdough starter"]);
    assert!(phrases.contains(&"sourdough starter".to_string()));
    let unique: std::collections::BTreeSet<&String> = phrases.iter().collect();
    assert_eq!(unique.len(), phrases.len());
}

#[test]
fn candidates_most_frequent_first() {
    let phrases = candidate_phrases(&["levain levain levain banneton"]);
    assert_eq!(phrases.first().map(String::as_str), Some("levain"));
}

#[test]
fn candidates_never_longer_than_three_words() {
    let phrases = candidate_phrases(&["sourdough starter hydration crumb levain banneton"]);
    assert!(phrases.iter().all(|p| p.split(' ').count() <= 3));
}

// ============================================================
// topical_consistency / semantic_relevance
// ============================================================

#[test]
fn consistency_no_clusters_is_full() {
    assert_eq!(topical_consistency(&[]), 100.0);
}

#[test]
fn consistency_three_even_clusters_is_zero() {
    assert!(topical_consistency(&[4, 4, 4]).abs() < 1e-9);
}

#[test]
fn consistency_dominant_cluster_beats_even_split() {
    assert!(topical_consistency(&[10, 1, 1]) > topical_consistency(&[4, 4, 4]));
}

#[test]
fn relevance_all_noise_is_zero() {
    let embeddings = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
    assert_eq!(semantic_relevance(&embeddings, &[NOISE, NOISE]), 0.0);
}

#[test]
fn relevance_averages_across_clusters() {
    // Cluster 0 members identical (1.0), cluster 1 members orthogonal (0.0)
    let embeddings = vec![
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
    ];
    let r = semantic_relevance(&embeddings, &[0, 0, 1, 1]);
    assert!((r - 50.0).abs() < 1e-9, "got {r}");
}

// ============================================================
// ClusterEngine
// ============================================================

#[test]
fn engine_separates_dense_groups_without_fallback() {
    let points = two_groups();
    let clustering = engine().cluster(&points, &points);
    assert_eq!(clustering.labels.len(), points.len());
    assert_eq!(clustering.fallback, None);
    assert_eq!(clustering.cluster_count(), 2);
    assert_ne!(clustering.labels[0], clustering.labels[9]);
}

#[test]
fn engine_tiny_corpus_fallback() {
    let points = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
    let clustering = engine().cluster(&points, &points);
    assert_eq!(clustering.labels, vec![0, 0]);
    assert_eq!(clustering.fallback, Some(FallbackKind::TinyCorpus));
}

#[test]
fn engine_three_orthogonal_points_fall_back_to_linkage() {
    let points = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
    let clustering = engine().cluster(&points, &points);
    assert_eq!(clustering.fallback, Some(FallbackKind::NoDenseCluster));
    assert_eq!(clustering.labels, vec![0, 1, 2]);
    assert_eq!(clustering.noise_count(), 0);
}

#[test]
fn hdbscan_three_points_never_select_root() {
    let points = vec![vec![0.0], vec![0.1], vec![5.0]];
    let result = Hdbscan::new(2).fit(&points);
    assert_eq!(result.cluster_count, 0);
    assert!(result.labels.iter().all(|&l| l == NOISE));
}

// ============================================================
// ManifoldReducer
// ============================================================

#[test]
fn reducer_output_shape() {
    let points = two_groups();
    let reduced = reducer(42).fit_transform(&points);
    assert_eq!(reduced.len(), points.len());
    assert!(reduced.iter().all(|p| p.len() == 2));
    assert!(reduced.iter().flatten().all(|x| x.is_finite()));
}

#[test]
fn reducer_same_seed_same_layout() {
    let points = two_groups();
    assert_eq!(reducer(3).fit_transform(&points), reducer(3).fit_transform(&points));
}

// ============================================================
// representative_terms
// ============================================================

#[test]
fn representative_terms_respects_top_n() {
    let texts = vec![
        "sourdough starter hydration crumb".to_string(),
        "levain banneton proofing crumb".to_string(),
    ];
    assert!(representative_terms(&texts, 3).len() <= 3);
    assert!(representative_terms(&texts, 0).is_empty());
    assert!(representative_terms(&[], 5).is_empty());
}
