// Topic discovery: embeddings, manifold reduction, density clustering,
// keyword ranking and the consistency metrics built on top of them.

pub mod cluster;
pub mod consistency;
pub mod download;
pub mod embeddings;
pub mod hashing;
pub mod hdbscan;
pub mod keywords;
pub mod reduce;
pub mod text;
pub mod tfidf;
pub mod traits;
