// Sentence embeddings with all-MiniLM-L6-v2, plus the vector math shared by
// every later stage (centroids, cosine similarity, normalization).
//
// The model runs locally via ONNX, so there are no API calls and no rate
// limits. Token embeddings are mean-pooled under the attention mask and the
// pooled vector is L2-normalized, matching how the model was trained.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::debug;

use super::traits::Embedder;

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Longest token sequence fed to the model. Crawled pages are long; the
/// opening of a page carries most of its topic signal.
const MAX_TOKENS: usize = 256;

/// Texts per inference call. Bounds the padded tensor size.
const INFERENCE_BATCH: usize = 32;

/// Sentence embedder backed by a local ONNX model. The session sits behind
/// a mutex because `Session::run` needs `&mut`.
pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl OnnxEmbedder {
    /// Load the model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Run `keystone download-model` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = require_file(model_dir, "model.onnx", "model")?;
        let tokenizer_path = require_file(model_dir, "tokenizer.json", "tokenizer")?;

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load embedding model from {}", model_path.display()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {e}"))?;

        debug!(model_dir = %model_dir.display(), max_tokens = MAX_TOKENS, "Loaded sentence embedding model");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

fn require_file(dir: &Path, name: &str, what: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if !path.exists() {
        anyhow::bail!(
            "Embedding {what} not found: {}\nRun `keystone download-model` to download it.",
            path.display()
        );
    }
    Ok(path)
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Inference runs on the blocking pool, INFERENCE_BATCH texts at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut out = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(INFERENCE_BATCH) {
                let batch = PaddedBatch::encode(&tokenizer, chunk)?;
                if batch.seq_len == 0 {
                    out.extend(std::iter::repeat_n(vec![0.0; EMBEDDING_DIM], chunk.len()));
                    continue;
                }
                let hidden = run_model(&session, &batch)?;
                out.extend(batch.mean_pool(&hidden));
            }
            Ok(out)
        })
        .await
        .context("Embedding task panicked")?
    }
}

/// A tokenized chunk, right-padded to its longest sequence.
struct PaddedBatch {
    size: usize,
    seq_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
}

impl PaddedBatch {
    fn encode(tokenizer: &Tokenizer, texts: &[String]) -> Result<Self> {
        let encodings = texts
            .iter()
            .map(|t| {
                tokenizer
                    .encode(t.as_str(), true)
                    .map_err(|e| anyhow::anyhow!("Tokenization failed: {e}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let size = encodings.len();
        let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut input_ids = Vec::with_capacity(size * seq_len);
        let mut attention_mask = Vec::with_capacity(size * seq_len);
        for enc in &encodings {
            let pad = seq_len - enc.get_ids().len();
            input_ids.extend(enc.get_ids().iter().map(|&id| i64::from(id)));
            input_ids.extend(std::iter::repeat_n(0, pad));
            attention_mask.extend(enc.get_attention_mask().iter().map(|&m| i64::from(m)));
            attention_mask.extend(std::iter::repeat_n(0, pad));
        }

        Ok(Self {
            size,
            seq_len,
            input_ids,
            attention_mask,
        })
    }

    /// Average the hidden states of unmasked tokens, then L2-normalize.
    fn mean_pool(&self, hidden: &[f32]) -> Vec<Vec<f64>> {
        (0..self.size)
            .map(|i| {
                let mut pooled = vec![0.0_f64; EMBEDDING_DIM];
                let mut tokens = 0usize;
                for j in 0..self.seq_len {
                    let pos = i * self.seq_len + j;
                    if self.attention_mask[pos] == 0 {
                        continue;
                    }
                    tokens += 1;
                    let row = &hidden[pos * EMBEDDING_DIM..(pos + 1) * EMBEDDING_DIM];
                    for (slot, &h) in pooled.iter_mut().zip(row) {
                        *slot += f64::from(h);
                    }
                }
                if tokens > 0 {
                    pooled.iter_mut().for_each(|v| *v /= tokens as f64);
                }
                l2_normalize(&mut pooled);
                pooled
            })
            .collect()
    }
}

/// Run the model on one padded batch and return `last_hidden_state`
/// flattened as [batch, seq_len, EMBEDDING_DIM].
fn run_model(session: &Mutex<Session>, batch: &PaddedBatch) -> Result<Vec<f32>> {
    let shape = [batch.size as i64, batch.seq_len as i64];
    let input_ids = Tensor::from_array((shape, batch.input_ids.clone())).context("Failed to create input_ids tensor")?;
    let attention_mask =
        Tensor::from_array((shape, batch.attention_mask.clone())).context("Failed to create attention_mask tensor")?;
    let token_type_ids = Tensor::from_array((shape, vec![0i64; batch.size * batch.seq_len]))
        .context("Failed to create token_type_ids tensor")?;

    let hidden = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {e}"))?;
        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            })
            .context("Embedding ONNX inference failed")?;
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;
        data.to_vec()
    };

    let expected = batch.size * batch.seq_len * EMBEDDING_DIM;
    if hidden.len() != expected {
        anyhow::bail!(
            "Embedding model returned {} values, expected {expected} ({} x {} x {EMBEDDING_DIM})",
            hidden.len(),
            batch.size,
            batch.seq_len
        );
    }

    debug!(batch_size = batch.size, seq_len = batch.seq_len, "Computed sentence embeddings");
    Ok(hidden)
}

/// Scale a vector to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Component-wise mean of a set of equal-length vectors.
///
/// This is a cluster centroid when given the member embeddings. Returns an
/// empty vector for empty input.
pub fn mean_embedding(embeddings: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = embeddings.first() else {
        return Vec::new();
    };

    let n = embeddings.len() as f64;
    let mut mean = vec![0.0_f64; first.len()];
    for emb in embeddings {
        for (slot, &val) in mean.iter_mut().zip(emb.iter()) {
            *slot += val;
        }
    }
    for val in &mut mean {
        *val /= n;
    }
    mean
}

/// Cosine similarity between two embedding vectors, clamped to 0.0..=1.0.
///
/// Opposed vectors count as unrelated rather than "negatively related";
/// every score built on top of this assumes a unit range.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = mag_a * mag_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_embedding_multiple() {
        let embeddings = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let mean = mean_embedding(&embeddings);
        assert_eq!(mean, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_mean_embedding_keeps_input_dimension() {
        let mean = mean_embedding(&[vec![1.0, 2.0]]);
        assert_eq!(mean.len(), 2);
    }

    #[test]
    fn test_mean_embedding_empty() {
        assert!(mean_embedding(&[]).is_empty());
    }

    #[test]
    fn test_cosine_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(sim.abs() < 1e-10);
    }

    #[test]
    fn test_cosine_opposite_clamps_to_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_mismatched_dimensions() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-12);
        assert!((v[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_l2_normalize_zero_vector_untouched() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
