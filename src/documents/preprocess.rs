// Document preprocessing: clean crawl text and drop pages too short to
// carry a topic signal.
//
// Markup and boilerplate are removed upstream by the crawler. What reaches
// us can still contain control characters, zero-width joiners, stray tags
// and ragged whitespace, which would otherwise leak into n-gram candidates.

use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::{debug, info};

use super::{CrawlRecord, Document};
use crate::error::{AnalysisError, Result};

/// Outcome of preprocessing a crawl batch.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub documents: Vec<Document>,
    /// Records discarded for falling below the word threshold
    pub dropped: usize,
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]{0,200}>").expect("valid regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Normalize a raw page text into analyzable prose.
///
/// Strips leftover tags, control and zero-width characters, then collapses
/// every whitespace run to a single space.
pub fn clean_text(raw: &str) -> String {
    let without_tags = tag_re().replace_all(raw, " ");
    let visible: String = without_tags
        .chars()
        .map(|c| {
            if c.is_control() {
                ' '
            } else {
                c
            }
        })
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'))
        .collect();
    whitespace_re()
        .replace_all(&visible, " ")
        .trim()
        .to_string()
}

/// Clean every record and keep those with at least `min_words` words.
///
/// Fails with `AnalysisError::Input` only when nothing survives.
pub fn preprocess(records: &[CrawlRecord], min_words: usize) -> Result<Preprocessed> {
    let mut documents = Vec::with_capacity(records.len());
    let mut dropped = 0usize;

    for record in records {
        let clean = clean_text(&record.text);
        let words = clean.split_whitespace().count();
        if words < min_words {
            debug!(url = %record.url, words, min_words, "Dropping short document");
            dropped += 1;
            continue;
        }
        documents.push(Document {
            id: documents.len(),
            url: record.url.trim().to_string(),
            raw_text: record.text.clone(),
            clean_text: clean,
            embedding: Vec::new(),
        });
    }

    info!(
        kept = documents.len(),
        dropped,
        min_words,
        "Preprocessed crawl records"
    );

    if documents.is_empty() {
        return Err(AnalysisError::Input { dropped, min_words });
    }

    Ok(Preprocessed { documents, dropped })
}
