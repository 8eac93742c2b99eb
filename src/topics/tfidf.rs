// TF-IDF representative terms for a topic.
//
// Complements the embedding-ranked keywords with plain lexical statistics.
// Each member document counts as a separate document for IDF, so words that
// appear on every page of the topic get downweighted while words distinctive
// to some pages get boosted.

use keyword_extraction::tf_idf::{TfIdf, TfIdfParams};
use stop_words::{get, LANGUAGE};
use tracing::debug;

/// Top `top_n` TF-IDF terms across `texts`, highest score first.
///
/// Returns an empty list for empty input or when no term survives stop word
/// removal.
pub fn representative_terms(texts: &[String], top_n: usize) -> Vec<String> {
    if texts.is_empty() || top_n == 0 {
        return Vec::new();
    }

    let stop_words: Vec<String> = get(LANGUAGE::English);
    let params = TfIdfParams::UnprocessedDocuments(texts, &stop_words, None);
    let tfidf = TfIdf::new(params);

    let ranked: Vec<(String, f32)> = tfidf.get_ranked_word_scores(top_n);

    debug!(
        documents = texts.len(),
        terms = ranked.len(),
        "Extracted TF-IDF representative terms"
    );

    ranked.into_iter().map(|(word, _)| word).collect()
}
