// Feature-hashing embedder: a model-free fallback for the ONNX embedder.
//
// Content words and adjacent word pairs are hashed into a fixed number of
// signed buckets and the result is L2-normalized. Documents sharing
// vocabulary point in similar directions; documents with disjoint vocabulary
// are close to orthogonal. No semantics beyond surface overlap, but fully
// deterministic and available offline.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use anyhow::Result;
use async_trait::async_trait;

use super::embeddings::{l2_normalize, EMBEDDING_DIM};
use super::text::content_tokens;
use super::traits::Embedder;

/// Weight of a word pair relative to a single word.
const BIGRAM_WEIGHT: f64 = 0.5;

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed one text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f64> {
        let tokens = content_tokens(text);
        let mut v = vec![0.0_f64; self.dimension];

        for token in &tokens {
            self.add_feature(&mut v, token, 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut v, &bigram, BIGRAM_WEIGHT);
        }

        l2_normalize(&mut v);
        v
    }

    fn add_feature(&self, v: &mut [f64], feature: &str, weight: f64) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
