// Embedder trait: the swap-ready abstraction for the embedding service.
//
// The pipeline never constructs an embedder itself. The caller builds one
// (ONNX model or feature hashing), keeps it for as long as it likes, and
// passes it into each run by reference.

use anyhow::Result;
use async_trait::async_trait;

/// Maps texts to fixed-dimension dense vectors.
///
/// Implementations must be deterministic: the same text under the same
/// model configuration always yields the same vector. Runs are compared
/// across invocations, so any randomness here breaks reproducibility.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, returning one vector per text in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}
