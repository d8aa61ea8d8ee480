//! Query processing pipeline
//!
//! The orchestrator that turns a raw query string plus optional session
//! context into a ranked result list: sanitize, cache probe, NLP analysis,
//! location resolution, embedding, hybrid retrieval, filtering, ranking,
//! and response assembly, with per-step telemetry and partial-result
//! semantics throughout.

pub mod location;
pub mod orchestrator;
pub mod response;
pub mod sanitize;

pub use location::{LocationInputs, LocationResolver};
pub use orchestrator::{PipelineConfig, RequestMeta, SearchPipeline, SearchSession};
pub use response::{Pagination, SearchResponse};
pub use sanitize::{is_near_me_query, normalize_query, sanitize_query};
