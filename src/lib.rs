// Keystone: topical authority analysis for crawled websites
//
// This is the library root. Each module corresponds to a stage or concern
// of the analysis pipeline.

pub mod config;
pub mod documents;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod topics;
