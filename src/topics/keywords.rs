// Keyword ranking per topic (KeyBERT-style).
//
// Candidate phrases are 1-3 word n-grams drawn from the topic's member
// documents. Each candidate is embedded with the same embedder as the
// documents and scored by cosine similarity to the topic centroid. The
// final list is picked greedily, skipping any candidate too similar to a
// phrase already chosen, so a topic doesn't end up with ten spellings of
// the same idea.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::embeddings::cosine_similarity;
use super::text::{is_stop_word, token_runs};
use super::traits::Embedder;
use crate::config::AnalysisConfig;

/// Longest n-gram considered.
const MAX_NGRAM: usize = 3;

/// Most frequent candidates kept before embedding. Bounds the embedding
/// batch for large topics.
const MAX_CANDIDATES: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub phrase: String,
    pub score: f64,
}

pub struct KeywordRanker {
    pub top_n: usize,
    /// Candidates whose similarity to an already-selected phrase exceeds
    /// this are skipped.
    pub diversity: f64,
}

impl KeywordRanker {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            top_n: config.top_n_keywords,
            diversity: config.keyword_diversity,
        }
    }

    /// Rank keywords for one topic.
    ///
    /// `texts` are the cleaned texts of the topic's members and `centroid`
    /// their mean embedding. Returns at most `top_n` keywords in selection
    /// order (descending relevance).
    pub async fn rank(&self, texts: &[&str], centroid: &[f64], embedder: &dyn Embedder) -> Result<Vec<Keyword>> {
        let candidates = candidate_phrases(texts);
        if candidates.is_empty() || self.top_n == 0 {
            return Ok(Vec::new());
        }

        let vectors = embedder
            .embed_batch(&candidates)
            .await
            .context("Failed to embed keyword candidates")?;
        if vectors.len() != candidates.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} keyword candidates",
                vectors.len(),
                candidates.len()
            );
        }

        let mut scored: Vec<(usize, f64)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(v, centroid)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| candidates[a.0].cmp(&candidates[b.0]))
        });

        let mut selected: Vec<usize> = Vec::with_capacity(self.top_n);
        for &(idx, _) in &scored {
            if selected.len() >= self.top_n {
                break;
            }
            let redundant = selected
                .iter()
                .any(|&s| cosine_similarity(&vectors[idx], &vectors[s]) > self.diversity);
            if !redundant {
                selected.push(idx);
            }
        }

        let scores: BTreeMap<usize, f64> = scored.into_iter().collect();
        let keywords: Vec<Keyword> = selected
            .into_iter()
            .map(|idx| Keyword {
                phrase: candidates[idx].clone(),
                score: scores.get(&idx).copied().unwrap_or(0.0),
            })
            .collect();

        debug!(
            candidates = candidates.len(),
            selected = keywords.len(),
            top = keywords.first().map(|k| k.phrase.as_str()).unwrap_or(""),
            "Ranked topic keywords"
        );

        Ok(keywords)
    }
}

/// Distinct 1-3 word candidate phrases, most frequent first (ties by
/// phrase), capped at MAX_CANDIDATES.
///
/// N-grams are windows over the tokenizer's runs, so they never span a
/// discarded token. An n-gram that starts or ends with a stop word is
/// skipped.
pub fn candidate_phrases(texts: &[&str]) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for run in texts.iter().flat_map(|text| token_runs(text)) {
        for n in 1..=MAX_NGRAM {
            for window in run.windows(n) {
                if is_stop_word(&window[0]) || is_stop_word(&window[n - 1]) {
                    continue;
                }
                *counts.entry(window.join(" ")).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    // BTreeMap order is already by phrase, so a stable sort on count keeps
    // phrase order within equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(MAX_CANDIDATES);
    ranked.into_iter().map(|(phrase, _)| phrase).collect()
}
