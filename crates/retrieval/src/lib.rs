//! Hybrid retrieval
//!
//! The retrieval half of the pipeline: the cached query embedder, the two
//! retrievers (keyword and semantic), weighted score fusion with the
//! classifier authority override, the filter stage, and the multi-factor
//! ranker. The two retrievers run concurrently; the merger provides the
//! deterministic projection over their unordered outputs.

pub mod embedder;
pub mod filter;
pub mod hybrid;
pub mod keyword;
pub mod ranker;
pub mod semantic;
pub mod similarity;

pub use embedder::{is_zero_vector, EmbedderConfig, QueryEmbedder};
pub use filter::{apply_filters, FilterContext, FilterPolicy};
pub use hybrid::{merge_hybrid, FusionWeights, HybridItem};
pub use keyword::{
    combine_relevance, keyword_boost, match_text, tokenize_query, CategoryMatch, KeywordHit,
    KeywordRetriever, KeywordRetrieverConfig,
};
pub use ranker::{rank, RankedBusiness};
pub use semantic::{GeoFilter, SemanticHit, SemanticRetriever, SemanticRetrieverConfig};
pub use similarity::cosine_similarity;

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Candidate selection failed: {0}")]
    Candidates(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
}

impl From<RetrievalError> for localfind_core::Error {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Dimension { expected, actual } => {
                localfind_core::Error::EmbeddingDimensionMismatch { expected, actual }
            }
            other => localfind_core::Error::Retrieval(other.to_string()),
        }
    }
}
