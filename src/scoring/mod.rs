// Scoring: domain metrics sources and the authority score that combines
// them with topical consistency.

pub mod authority;
pub mod domain;
pub mod metrics;
pub mod moz;
pub mod rdap;
