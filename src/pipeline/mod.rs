// Pipeline orchestration: topic discovery and the full analysis run.

pub mod analyze;
pub mod discover;
