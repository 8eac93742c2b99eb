// Crawl input records and the cleaned, embeddable documents
// derived from them.

pub mod preprocess;

use serde::{Deserialize, Serialize};

/// One page as produced by the external crawler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    #[serde(default)]
    pub url: String,
    pub text: String,
}

/// A document that survived preprocessing.
///
/// `embedding` is empty until the embedding stage attaches one; after that
/// the document is treated as immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Dense id, 0..n in crawl order of the surviving records
    pub id: usize,
    pub url: String,
    pub raw_text: String,
    pub clean_text: String,
    pub embedding: Vec<f64>,
}

impl Document {
    pub fn is_embedded(&self) -> bool {
        !self.embedding.is_empty()
    }
}
