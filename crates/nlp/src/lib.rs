//! Query understanding
//!
//! Three model-backed tasks - intent detection, category classification,
//! and entity extraction - plus the heuristic fallback used when the model
//! path is unavailable. Each task is memoized in-process for a day, keyed
//! by the lowercased trimmed query, and every external call is admitted
//! through the rate limiter and wrapped by the fallback harness.

pub mod analyzer;
pub mod heuristics;
pub mod parse;
pub mod prompts;

pub use analyzer::{AnalysisOutcome, AnalyzerOptions, CallContext, CategoryResult, QueryAnalyzer};
pub use heuristics::heuristic_analysis;

use thiserror::Error;

/// NLP errors
#[derive(Error, Debug)]
pub enum NlpError {
    #[error("Model reply unparseable: {0}")]
    Unparseable(String),

    #[error("Model reply invalid: {0}")]
    InvalidReply(String),
}

impl From<NlpError> for localfind_core::Error {
    fn from(err: NlpError) -> Self {
        localfind_core::Error::Nlp(err.to_string())
    }
}
