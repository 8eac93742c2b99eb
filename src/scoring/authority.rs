// Topical authority score.
//
// Three components, each on a 0-100 scale, are averaged into a base score:
//
//   semantic_relevance    how tightly each topic's pages agree
//   topical_consistency   how concentrated the site is on few topics
//   backlink_quality      DA, spam and linking root domains from the
//                         external metrics provider
//
// A domain age bonus (2 points per year, capped at 10) is added on top and
// the result is capped at 100.
//
// Missing metrics never fail a run. They fall back to a neutral backlink
// quality and leave a "partial data" warning on the score. A component that
// escapes its range after all clamping is a defect and is returned as
// ScoreOutOfRange rather than silently clamped.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::metrics::{DomainMetrics, MetricsStatus};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::topics::consistency::ConsistencyMetrics;

/// Weight of domain authority inside backlink quality.
const DA_WEIGHT: f64 = 0.5;
/// Weight of the inverted spam score inside backlink quality.
const SPAM_WEIGHT: f64 = 0.2;
/// Weight of the log-scaled root domain count inside backlink quality.
const ROOT_DOMAINS_WEIGHT: f64 = 0.3;

const AGE_BONUS_PER_YEAR: f64 = 2.0;
const MAX_AGE_BONUS: f64 = 10.0;

/// Spam scores above this get their own recommendation.
const SPAM_RECOMMENDATION_THRESHOLD: f64 = 30.0;
/// Components below this get their own recommendation.
const COMPONENT_RECOMMENDATION_THRESHOLD: f64 = 70.0;
const MIN_TOPICS_FOR_COVERAGE: usize = 3;

/// Letter grade for a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// >=90 A+, >=80 A, >=70 B, >=60 C, >=50 D, else F.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::APlus
        } else if score >= 80.0 {
            Grade::A
        } else if score >= 70.0 {
            Grade::B
        } else if score >= 60.0 {
            Grade::C
        } else if score >= 50.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The final score and its breakdown. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityScore {
    pub semantic_relevance: f64,
    pub topical_consistency: f64,
    pub backlink_quality: f64,
    pub domain_age_bonus: f64,
    pub final_score: f64,
    pub grade: Grade,
    pub interpretation: String,
    /// Degraded-mode notes ("partial data: ...", clamped inputs)
    pub warnings: Vec<String>,
}

/// One-sentence reading of a final score.
pub fn interpret_score(score: f64) -> &'static str {
    if score >= 90.0 {
        "Exceptional topical authority with strong content focus and authoritative backlinks"
    } else if score >= 80.0 {
        "Strong topical authority with good content coherence and solid domain metrics"
    } else if score >= 70.0 {
        "Good topical authority with room for improvement in content focus or backlinks"
    } else if score >= 60.0 {
        "Moderate topical authority; consider improving content consistency and link building"
    } else if score >= 50.0 {
        "Fair topical authority; significant improvements needed in multiple areas"
    } else {
        "Weak topical authority; requires comprehensive SEO strategy overhaul"
    }
}

/// `DA * 0.5 + spam_penalty * 0.2 + backlink_score * 0.3`, where
/// `spam_penalty = clamp(100 - 2 * spam, 0, 100)` and
/// `backlink_score = clamp(log10(root_domains + 1) * scale, 0, 100)`.
///
/// Inputs are expected in range already.
pub fn backlink_quality(domain_authority: f64, spam_score: f64, root_domains: u64, scale: f64) -> f64 {
    let spam_penalty = (100.0 - spam_score * 2.0).clamp(0.0, 100.0);
    let backlink_score = ((root_domains as f64 + 1.0).log10() * scale).clamp(0.0, 100.0);
    domain_authority * DA_WEIGHT + spam_penalty * SPAM_WEIGHT + backlink_score * ROOT_DOMAINS_WEIGHT
}

/// Two points per year of domain age, capped at 10.
pub fn domain_age_bonus(years: f64) -> f64 {
    (years * AGE_BONUS_PER_YEAR).min(MAX_AGE_BONUS)
}

pub struct AuthorityScorer {
    pub backlink_scale: f64,
    pub neutral_backlink_quality: f64,
}

impl AuthorityScorer {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            backlink_scale: config.backlink_scale,
            neutral_backlink_quality: config.neutral_backlink_quality,
        }
    }

    /// Combine consistency metrics and external metrics into the final score.
    pub fn score(&self, consistency: &ConsistencyMetrics, metrics: &MetricsStatus) -> Result<AuthorityScore> {
        let mut warnings = Vec::new();

        let semantic_relevance = check_range("semantic_relevance", consistency.semantic_relevance, 0.0, 100.0)?;
        let topical_consistency =
            check_range("topical_consistency", consistency.topical_consistency, 0.0, 100.0)?;

        let (backlink_quality, domain_age_bonus) = match metrics {
            MetricsStatus::Available(m) => (
                self.backlink_component(m, &mut warnings),
                age_component(m, &mut warnings),
            ),
            MetricsStatus::Unavailable(reason) => {
                warnings.push(format!(
                    "partial data: domain metrics unavailable ({reason}); backlink quality set to neutral {}",
                    self.neutral_backlink_quality
                ));
                (self.neutral_backlink_quality, 0.0)
            }
        };
        let backlink_quality = check_range("backlink_quality", backlink_quality, 0.0, 100.0)?;
        let domain_age_bonus = check_range("domain_age_bonus", domain_age_bonus, 0.0, MAX_AGE_BONUS)?;

        let base_score = (semantic_relevance + topical_consistency + backlink_quality) / 3.0;
        let final_score = check_range("final_score", (base_score + domain_age_bonus).min(100.0), 0.0, 100.0)?;
        let grade = Grade::from_score(final_score);

        info!(
            semantic_relevance,
            topical_consistency,
            backlink_quality,
            domain_age_bonus,
            final_score,
            grade = %grade,
            warnings = warnings.len(),
            "Authority score computed"
        );

        Ok(AuthorityScore {
            semantic_relevance,
            topical_consistency,
            backlink_quality,
            domain_age_bonus,
            final_score,
            grade,
            interpretation: interpret_score(final_score).to_string(),
            warnings,
        })
    }

    fn backlink_component(&self, m: &DomainMetrics, warnings: &mut Vec<String>) -> f64 {
        let da = clamp_input("domain_authority", m.domain_authority, 0.0, 100.0, warnings);
        let spam = clamp_input("spam_score", m.spam_score, 0.0, 100.0, warnings);

        match (da, spam, m.root_domains_linking) {
            (Some(da), Some(spam), Some(roots)) => backlink_quality(da, spam, roots, self.backlink_scale),
            (da, spam, roots) => {
                let missing: Vec<&str> = [
                    ("domain_authority", da.is_none()),
                    ("spam_score", spam.is_none()),
                    ("root_domains_linking", roots.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();
                warn!(missing = ?missing, "Incomplete domain metrics, using neutral backlink quality");
                warnings.push(format!(
                    "partial data: missing {}; backlink quality set to neutral {}",
                    missing.join(", "),
                    self.neutral_backlink_quality
                ));
                self.neutral_backlink_quality
            }
        }
    }
}

fn age_component(m: &DomainMetrics, warnings: &mut Vec<String>) -> f64 {
    match clamp_input("domain_age_years", m.domain_age_years, 0.0, f64::MAX, warnings) {
        Some(years) => domain_age_bonus(years),
        None => {
            warnings.push("partial data: domain age unknown; no age bonus applied".to_string());
            0.0
        }
    }
}

/// Clamp an external input into its documented domain. Out-of-range values
/// are clamped with a warning; non-finite values count as missing.
fn clamp_input(name: &str, value: Option<f64>, min: f64, max: f64, warnings: &mut Vec<String>) -> Option<f64> {
    let v = value?;
    if !v.is_finite() {
        warn!(field = name, value = v, "Non-finite metric treated as missing");
        warnings.push(format!("{name} was not a finite number and was ignored"));
        return None;
    }
    if v < min || v > max {
        let clamped = v.clamp(min, max);
        warn!(field = name, value = v, clamped, "Metric outside its range, clamped");
        warnings.push(format!("{name} {v} outside [{min}, {max}], clamped to {clamped}"));
        return Some(clamped);
    }
    Some(v)
}

fn check_range(component: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        error!(component, value, min, max, "Score component out of range");
        Err(AnalysisError::ScoreOutOfRange {
            component,
            value,
            min,
            max,
        })
    }
}

/// Actionable suggestions derived from the score breakdown.
pub fn recommendations(score: &AuthorityScore, topic_count: usize, metrics: Option<&DomainMetrics>) -> Vec<String> {
    let mut out = Vec::new();

    if score.semantic_relevance < COMPONENT_RECOMMENDATION_THRESHOLD {
        out.push(
            "Improve content relevance: focus on creating more semantically related content within your main topics."
                .to_string(),
        );
    }
    if score.topical_consistency < COMPONENT_RECOMMENDATION_THRESHOLD {
        out.push("Increase topical consistency: narrow your content focus to fewer, more coherent topics.".to_string());
    }
    if score.backlink_quality < COMPONENT_RECOMMENDATION_THRESHOLD {
        out.push(
            "Build quality backlinks: focus on acquiring backlinks from authoritative domains in your niche.".to_string(),
        );
    }
    if metrics
        .and_then(|m| m.spam_score)
        .is_some_and(|s| s > SPAM_RECOMMENDATION_THRESHOLD)
    {
        out.push("Address spam score: audit and disavow toxic backlinks.".to_string());
    }
    if topic_count < MIN_TOPICS_FOR_COVERAGE {
        out.push(
            "Expand content coverage: create more diverse content to establish authority across related topics."
                .to_string(),
        );
    }
    if out.is_empty() {
        out.push(
            "Excellent work: the site demonstrates strong topical authority. Keep monitoring and maintaining it."
                .to_string(),
        );
    }

    out
}
