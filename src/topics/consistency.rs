// Consistency metrics over a clustering result.
//
// semantic_relevance: how tightly each topic's members agree with each
// other (mean pairwise cosine similarity, averaged across topics).
//
// topical_consistency: how concentrated the site is on few topics
// (one minus the normalized entropy of the topic-size distribution).
// A site that writes about one thing scores 100; a site whose pages are
// spread evenly over many unrelated topics scores 0.

use serde::{Deserialize, Serialize};
use tracing::error;

use super::cluster::Clustering;
use super::embeddings::cosine_similarity;
use super::hdbscan::NOISE;

/// Floating-point slack absorbed silently when pinning a percentage.
const PERCENT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyMetrics {
    /// 0.0..=100.0
    pub semantic_relevance: f64,
    /// 0.0..=100.0
    pub topical_consistency: f64,
}

pub fn compute(embeddings: &[Vec<f64>], clustering: &Clustering) -> ConsistencyMetrics {
    ConsistencyMetrics {
        semantic_relevance: semantic_relevance(embeddings, &clustering.labels),
        topical_consistency: topical_consistency(&clustering.cluster_sizes()),
    }
}

/// Mean over non-noise clusters of the mean pairwise cosine similarity of
/// their members, scaled to 0..=100.
///
/// Single-member clusters have no pairs and are skipped. No pairs at all
/// yields 0.
pub fn semantic_relevance(embeddings: &[Vec<f64>], labels: &[i32]) -> f64 {
    let max_label = labels.iter().copied().max().unwrap_or(NOISE);
    if max_label < 0 {
        return 0.0;
    }

    let mut cluster_means = Vec::new();
    for label in 0..=max_label {
        let members: Vec<&Vec<f64>> = embeddings
            .iter()
            .zip(labels)
            .filter(|&(_, &l)| l == label)
            .map(|(e, _)| e)
            .collect();
        if members.len() < 2 {
            continue;
        }

        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                total += cosine_similarity(members[i], members[j]);
                pairs += 1;
            }
        }
        cluster_means.push(total / pairs as f64);
    }

    if cluster_means.is_empty() {
        return 0.0;
    }
    let mean = cluster_means.iter().sum::<f64>() / cluster_means.len() as f64;
    bounded_percent("semantic_relevance", mean * 100.0)
}

/// `(1 - H / log2(k)) * 100` over the non-noise cluster sizes, where H is
/// the base-2 Shannon entropy and k the number of non-empty clusters.
/// Zero or one cluster is perfectly consistent.
pub fn topical_consistency(cluster_sizes: &[usize]) -> f64 {
    let sizes: Vec<f64> = cluster_sizes
        .iter()
        .filter(|&&s| s > 0)
        .map(|&s| s as f64)
        .collect();
    if sizes.len() <= 1 {
        return 100.0;
    }

    let total: f64 = sizes.iter().sum();
    let entropy: f64 = sizes
        .iter()
        .map(|&s| {
            let p = s / total;
            -p * p.log2()
        })
        .sum();
    let normalized = entropy / (sizes.len() as f64).log2();
    bounded_percent("topical_consistency", (1.0 - normalized) * 100.0)
}

/// Pin rounding drift at the ends of 0..=100. Anything further out is a
/// bug upstream: it is logged and passed through so the scorer's range
/// check rejects it.
pub fn bounded_percent(metric: &'static str, value: f64) -> f64 {
    if (-PERCENT_TOLERANCE..=100.0 + PERCENT_TOLERANCE).contains(&value) {
        value.clamp(0.0, 100.0)
    } else {
        error!(metric, value, "Consistency metric outside 0..=100");
        value
    }
}
