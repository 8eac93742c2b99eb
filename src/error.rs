// Typed failures for an analysis run.
//
// Only fatal conditions live here. Degraded conditions (missing domain
// metrics, degenerate clustering) complete the run and surface as warnings
// on the AuthorityScore instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Nothing survived preprocessing.
    #[error("No valid documents after preprocessing ({dropped} dropped below {min_words} words)")]
    Input { dropped: usize, min_words: usize },

    /// The embedding backend failed or returned malformed vectors.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A score component escaped its documented bound. This is a defect,
    /// not a user-facing condition.
    #[error("{component} out of range: {value} not in [{min}, {max}]")]
    ScoreOutOfRange {
        component: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A blocking stage panicked or was cancelled by the runtime.
    #[error("Analysis task failed: {0}")]
    Task(String),
}

impl AnalysisError {
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        AnalysisError::Embedding(err.to_string())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        AnalysisError::InvalidConfig(msg.into())
    }
}

impl From<tokio::task::JoinError> for AnalysisError {
    fn from(err: tokio::task::JoinError) -> Self {
        AnalysisError::Task(err.to_string())
    }
}
