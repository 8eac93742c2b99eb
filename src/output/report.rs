// The JSON-serializable result of an analysis run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::authority::AuthorityScore;
use crate::scoring::domain::DomainStructure;
use crate::topics::cluster::FallbackKind;
use crate::topics::keywords::Keyword;

/// One discovered topic as presented to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: i32,
    /// Member document count
    pub size: usize,
    pub keywords: Vec<Keyword>,
    pub sample_urls: Vec<String>,
    /// Top TF-IDF terms of the member documents
    pub representative_terms: Vec<String>,
    /// Opening of the first member's text
    pub representative_text: String,
}

pub type TopicSet = Vec<Topic>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Documents that survived preprocessing
    pub total_documents: usize,
    pub dropped_documents: usize,
    pub total_topics: usize,
    /// Documents labeled as noise
    pub outliers: usize,
    pub fallback: Option<FallbackKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub domain: String,
    pub domain_structure: DomainStructure,
    pub analyzed_at: DateTime<Utc>,
    pub authority: AuthorityScore,
    pub topics: TopicSet,
    pub stats: CorpusStats,
    pub recommendations: Vec<String>,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize analysis report")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))
    }
}
