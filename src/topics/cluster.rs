// Cluster engine: HDBSCAN over the reduced space, with two degenerate
// fallbacks, and assembly of per-topic clusters (members + centroid).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::embeddings::{cosine_similarity, mean_embedding};
use super::hdbscan::{Hdbscan, NOISE};
use super::keywords::Keyword;
use crate::config::AnalysisConfig;
use crate::documents::Document;

/// Why clustering took a fallback path instead of HDBSCAN's own result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    /// Fewer documents than `min_cluster_size + 1`: everything is topic 0.
    TinyCorpus,
    /// HDBSCAN selected no cluster: documents grouped by similarity linkage.
    NoDenseCluster,
}

impl std::fmt::Display for FallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackKind::TinyCorpus => write!(f, "tiny corpus"),
            FallbackKind::NoDenseCluster => write!(f, "no dense cluster"),
        }
    }
}

/// One label per document, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub labels: Vec<i32>,
    pub fallback: Option<FallbackKind>,
}

impl Clustering {
    /// Distinct non-noise labels.
    pub fn cluster_count(&self) -> usize {
        self.labels
            .iter()
            .filter(|&&l| l != NOISE)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE).count()
    }

    /// Member counts of each non-noise cluster, indexed by label.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let max = self.labels.iter().copied().max().unwrap_or(NOISE);
        if max < 0 {
            return Vec::new();
        }
        let mut sizes = vec![0usize; max as usize + 1];
        for &label in &self.labels {
            if label >= 0 {
                sizes[label as usize] += 1;
            }
        }
        sizes
    }
}

/// A discovered topic: its members, their centroid and (once ranked) its
/// keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub label: i32,
    pub member_document_ids: BTreeSet<usize>,
    pub centroid: Vec<f64>,
    pub keywords: Vec<Keyword>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.member_document_ids.len()
    }
}

pub struct ClusterEngine {
    pub min_cluster_size: usize,
    pub linkage_threshold: f64,
}

impl ClusterEngine {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            min_cluster_size: config.min_cluster_size,
            linkage_threshold: config.linkage_threshold,
        }
    }

    /// Label every document.
    ///
    /// `reduced` drives the density clustering; `embeddings` (the original
    /// vectors, same order) are only consulted by the linkage fallback.
    pub fn cluster(&self, reduced: &[Vec<f64>], embeddings: &[Vec<f64>]) -> Clustering {
        let n = reduced.len();
        if n == 0 {
            return Clustering {
                labels: Vec::new(),
                fallback: None,
            };
        }

        if n < self.min_cluster_size + 1 {
            warn!(
                documents = n,
                min_cluster_size = self.min_cluster_size,
                "Corpus too small to cluster, treating all documents as one topic"
            );
            return Clustering {
                labels: vec![0; n],
                fallback: Some(FallbackKind::TinyCorpus),
            };
        }

        let result = Hdbscan::new(self.min_cluster_size).fit(reduced);
        if result.cluster_count > 0 {
            debug!(
                clusters = result.cluster_count,
                noise = result.labels.iter().filter(|&&l| l == NOISE).count(),
                "HDBSCAN clustering complete"
            );
            return Clustering {
                labels: result.labels,
                fallback: None,
            };
        }

        let labels = self.similarity_linkage(embeddings);
        warn!(
            documents = n,
            threshold = self.linkage_threshold,
            topics = labels.iter().collect::<BTreeSet<_>>().len(),
            "No dense cluster found, grouping documents by similarity linkage"
        );
        Clustering {
            labels,
            fallback: Some(FallbackKind::NoDenseCluster),
        }
    }

    /// Connected components of the graph joining documents whose cosine
    /// similarity is at least `linkage_threshold`. Labels are dense in
    /// order of each component's first document.
    fn similarity_linkage(&self, embeddings: &[Vec<f64>]) -> Vec<i32> {
        let n = embeddings.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], i: usize) -> usize {
            if parent[i] != i {
                parent[i] = find(parent, parent[i]);
            }
            parent[i]
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if cosine_similarity(&embeddings[i], &embeddings[j]) >= self.linkage_threshold {
                    let ri = find(&mut parent, i);
                    let rj = find(&mut parent, j);
                    if ri != rj {
                        // Lower index stays the root so labels follow input order
                        let (keep, merge) = if ri < rj { (ri, rj) } else { (rj, ri) };
                        parent[merge] = keep;
                    }
                }
            }
        }

        let mut label_of_root = vec![NOISE; n];
        let mut next = 0i32;
        (0..n)
            .map(|i| {
                let root = find(&mut parent, i);
                if label_of_root[root] == NOISE {
                    label_of_root[root] = next;
                    next += 1;
                }
                label_of_root[root]
            })
            .collect()
    }
}

/// Group documents by label into clusters with centroids, skipping noise.
/// Keywords are left empty for the keyword ranker to fill.
pub fn build_clusters(documents: &[Document], clustering: &Clustering) -> Vec<Cluster> {
    clustering
        .cluster_sizes()
        .iter()
        .enumerate()
        .filter(|&(_, &size)| size > 0)
        .map(|(label, _)| {
            let label = label as i32;
            let members: BTreeSet<usize> = documents
                .iter()
                .zip(&clustering.labels)
                .filter(|&(_, &l)| l == label)
                .map(|(doc, _)| doc.id)
                .collect();
            let embeddings: Vec<Vec<f64>> = documents
                .iter()
                .filter(|d| members.contains(&d.id))
                .map(|d| d.embedding.clone())
                .collect();
            Cluster {
                label,
                member_document_ids: members,
                centroid: mean_embedding(&embeddings),
                keywords: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ClusterEngine {
        ClusterEngine {
            min_cluster_size: 2,
            linkage_threshold: 0.5,
        }
    }

    fn doc(id: usize, embedding: Vec<f64>) -> Document {
        Document {
            id,
            url: format!("https://example.com/{id}"),
            raw_text: String::new(),
            clean_text: String::new(),
            embedding,
        }
    }

    #[test]
    fn test_tiny_corpus_is_one_topic() {
        let reduced = vec![vec![0.0], vec![1.0]];
        let c = engine().cluster(&reduced, &reduced);
        assert_eq!(c.labels, vec![0, 0]);
        assert_eq!(c.fallback, Some(FallbackKind::TinyCorpus));
    }

    #[test]
    fn test_empty_corpus() {
        let c = engine().cluster(&[], &[]);
        assert!(c.labels.is_empty());
        assert_eq!(c.fallback, None);
    }

    #[test]
    fn test_linkage_fallback_unrelated_documents_are_separate_topics() {
        let embeddings = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
        let reduced = vec![vec![0.0, 0.0], vec![5.0, 0.0], vec![0.0, 9.0]];
        let c = engine().cluster(&reduced, &embeddings);
        assert_eq!(c.fallback, Some(FallbackKind::NoDenseCluster));
        assert_eq!(c.labels, vec![0, 1, 2]);
    }

    #[test]
    fn test_linkage_fallback_near_duplicates_are_one_topic() {
        let embeddings = vec![vec![1.0, 0.0], vec![0.99, 0.01], vec![0.98, 0.02]];
        let reduced = vec![vec![0.0, 0.0], vec![5.0, 0.0], vec![0.0, 9.0]];
        let c = engine().cluster(&reduced, &embeddings);
        assert_eq!(c.fallback, Some(FallbackKind::NoDenseCluster));
        assert_eq!(c.labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_dense_clusters_take_no_fallback() {
        let reduced = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
        ];
        let c = engine().cluster(&reduced, &reduced);
        assert_eq!(c.fallback, None);
        assert_eq!(c.cluster_count(), 2);
        assert_eq!(c.noise_count(), 0);
    }

    #[test]
    fn test_cluster_sizes_skip_noise() {
        let c = Clustering {
            labels: vec![0, -1, 1, 0, -1],
            fallback: None,
        };
        assert_eq!(c.cluster_sizes(), vec![2, 1]);
        assert_eq!(c.cluster_count(), 2);
        assert_eq!(c.noise_count(), 2);
    }

    #[test]
    fn test_build_clusters_centroids_and_members() {
        let docs = vec![
            doc(0, vec![1.0, 0.0]),
            doc(1, vec![0.0, 1.0]),
            doc(2, vec![3.0, 0.0]),
        ];
        let clustering = Clustering {
            labels: vec![0, NOISE, 0],
            fallback: None,
        };
        let clusters = build_clusters(&docs, &clustering);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].label, 0);
        assert_eq!(clusters[0].member_document_ids, BTreeSet::from([0, 2]));
        assert_eq!(clusters[0].centroid, vec![2.0, 0.0]);
        assert_eq!(clusters[0].size(), 2);
    }
}
