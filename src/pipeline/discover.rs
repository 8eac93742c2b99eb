// Topic discovery: preprocess -> embed -> reduce -> cluster -> keywords ->
// consistency metrics.
//
// Each stage consumes the whole batch and hands its output forward. The
// reduction, clustering and metrics math is CPU-bound and runs on the
// blocking pool so the metrics fetch running alongside keeps making
// progress.

use tracing::info;

use crate::config::AnalysisConfig;
use crate::documents::preprocess::preprocess;
use crate::documents::{CrawlRecord, Document};
use crate::error::{AnalysisError, Result};
use crate::output::report::Topic;
use crate::output::truncate_chars;
use crate::topics::cluster::{build_clusters, Cluster, ClusterEngine, Clustering};
use crate::topics::consistency::{compute as compute_consistency, ConsistencyMetrics};
use crate::topics::keywords::KeywordRanker;
use crate::topics::reduce::ManifoldReducer;
use crate::topics::tfidf::representative_terms;
use crate::topics::traits::Embedder;

/// Characters of member text shown as a topic's representative text.
const REPRESENTATIVE_TEXT_CHARS: usize = 200;
/// TF-IDF terms listed per topic.
const REPRESENTATIVE_TERMS: usize = 10;

/// Everything topic discovery learned about the corpus.
#[derive(Debug, Clone)]
pub struct TopicDiscovery {
    pub documents: Vec<Document>,
    pub dropped: usize,
    pub clustering: Clustering,
    pub topics: Vec<Topic>,
    pub consistency: ConsistencyMetrics,
}

/// Run stages 1-6 over a crawl batch.
pub async fn discover_topics(
    records: &[CrawlRecord],
    config: &AnalysisConfig,
    embedder: &dyn Embedder,
) -> Result<TopicDiscovery> {
    // 1. Preprocess
    let pre = preprocess(records, config.min_words)?;
    let mut documents = pre.documents;
    info!(
        documents = documents.len(),
        dropped = pre.dropped,
        "Preprocessed crawl batch"
    );

    // 2. Embed
    let embeddings = embed_documents(&documents, embedder).await?;
    for (doc, embedding) in documents.iter_mut().zip(&embeddings) {
        doc.embedding = embedding.clone();
    }

    // 3-4, 6. Reduce, cluster and measure on the blocking pool
    let reducer = ManifoldReducer::from_config(config);
    let engine = ClusterEngine::from_config(config);
    let (clustering, consistency) = tokio::task::spawn_blocking(move || {
        let reduced = reducer.fit_transform(&embeddings);
        let clustering = engine.cluster(&reduced, &embeddings);
        let metrics = compute_consistency(&embeddings, &clustering);
        (clustering, metrics)
    })
    .await?;

    info!(
        topics = clustering.cluster_count(),
        outliers = clustering.noise_count(),
        fallback = ?clustering.fallback,
        semantic_relevance = consistency.semantic_relevance,
        topical_consistency = consistency.topical_consistency,
        "Clustered documents"
    );

    // 5. Keywords per cluster
    let ranker = KeywordRanker::from_config(config);
    let mut clusters = build_clusters(&documents, &clustering);
    let mut ranked = Vec::with_capacity(clusters.len());
    for cluster in &clusters {
        let texts: Vec<&str> = member_documents(&documents, cluster)
            .map(|d| d.clean_text.as_str())
            .collect();
        let keywords = ranker
            .rank(&texts, &cluster.centroid, embedder)
            .await
            .map_err(|e| AnalysisError::embedding(format!("{e:#}")))?;
        ranked.push(keywords);
    }
    for (cluster, keywords) in clusters.iter_mut().zip(ranked) {
        cluster.keywords = keywords;
    }

    let topics = build_topics(&documents, &clusters, config.sample_urls);

    Ok(TopicDiscovery {
        documents,
        dropped: pre.dropped,
        clustering,
        topics,
        consistency,
    })
}

/// Embed every document and check the result's shape: one vector per
/// document, all of the embedder's dimension.
async fn embed_documents(documents: &[Document], embedder: &dyn Embedder) -> Result<Vec<Vec<f64>>> {
    let texts: Vec<String> = documents.iter().map(|d| d.clean_text.clone()).collect();
    let embeddings = embedder
        .embed_batch(&texts)
        .await
        .map_err(|e| AnalysisError::embedding(format!("{e:#}")))?;

    if embeddings.len() != documents.len() {
        return Err(AnalysisError::embedding(format!(
            "expected {} vectors, got {}",
            documents.len(),
            embeddings.len()
        )));
    }
    let dimension = embedder.dimension();
    if let Some((i, v)) = embeddings.iter().enumerate().find(|(_, v)| v.len() != dimension) {
        return Err(AnalysisError::embedding(format!(
            "vector {i} has dimension {}, expected {dimension}",
            v.len()
        )));
    }
    if embeddings.iter().flatten().any(|x| !x.is_finite()) {
        return Err(AnalysisError::embedding("embedding contains non-finite values"));
    }

    info!(documents = documents.len(), dimension, "Embedded documents");
    Ok(embeddings)
}

fn member_documents<'a>(documents: &'a [Document], cluster: &'a Cluster) -> impl Iterator<Item = &'a Document> + 'a {
    cluster
        .member_document_ids
        .iter()
        .filter_map(move |&id| documents.get(id))
}

/// Caller-facing topics, largest first (ties by id).
fn build_topics(documents: &[Document], clusters: &[Cluster], sample_urls: usize) -> Vec<Topic> {
    let mut topics: Vec<Topic> = clusters
        .iter()
        .map(|cluster| {
            let members: Vec<&Document> = member_documents(documents, cluster).collect();
            let texts: Vec<String> = members.iter().map(|d| d.clean_text.clone()).collect();
            Topic {
                topic_id: cluster.label,
                size: cluster.size(),
                keywords: cluster.keywords.clone(),
                sample_urls: members
                    .iter()
                    .filter(|d| !d.url.is_empty())
                    .take(sample_urls)
                    .map(|d| d.url.clone())
                    .collect(),
                representative_terms: representative_terms(&texts, REPRESENTATIVE_TERMS),
                representative_text: members
                    .first()
                    .map(|d| truncate_chars(&d.clean_text, REPRESENTATIVE_TEXT_CHARS))
                    .unwrap_or_default(),
            }
        })
        .collect();

    topics.sort_by(|a, b| b.size.cmp(&a.size).then(a.topic_id.cmp(&b.topic_id)));
    topics
}
