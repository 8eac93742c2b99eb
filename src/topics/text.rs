// Word-level tokenization shared by the hashing embedder, the keyword
// ranker and the TF-IDF term extractor.

use std::collections::HashSet;
use std::sync::OnceLock;

use stop_words::{get, LANGUAGE};

/// English stop words from the stop-words crate, loaded once.
pub fn stop_words() -> &'static HashSet<String> {
    static WORDS: OnceLock<HashSet<String>> = OnceLock::new();
    WORDS.get_or_init(|| get(LANGUAGE::English).into_iter().collect())
}

pub fn is_stop_word(token: &str) -> bool {
    stop_words().contains(token)
}

/// Usable token: at least two characters and at least one letter, so
/// numbers and stray initials never become keywords.
fn is_word(token: &str) -> bool {
    token.chars().count() >= 2 && token.chars().any(char::is_alphabetic)
}

/// Lowercase word tokens grouped into runs.
///
/// Splits on anything that is not alphanumeric. A discarded token (a number,
/// a single character) closes the current run, so a phrase built inside one
/// run never bridges text the tokenizer dropped.
pub fn token_runs(text: &str) -> Vec<Vec<String>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
        if is_word(raw) {
            current.push(raw.to_lowercase());
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Lowercase word tokens, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    token_runs(text).into_iter().flatten().collect()
}

/// Tokens with stop words removed.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stop_word(t))
        .collect()
}
