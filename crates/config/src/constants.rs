//! Centralized constants
//!
//! Single source of truth for cache TTLs, retrieval weights, and limiter
//! defaults so that settings defaults and component defaults cannot drift.

/// Cache TTLs by purpose, in seconds. Advisory; expiry never leaks a stale
/// value regardless of backend.
pub mod ttl {
    /// Query analysis memo
    pub const ANALYSIS_SECS: u64 = 30 * 60;
    /// Query embeddings
    pub const EMBEDDING_SECS: u64 = 30 * 24 * 60 * 60;
    /// End-to-end result sets
    pub const RESULTS_SECS: u64 = 5 * 60;
    /// Semantic candidate id sets
    pub const CANDIDATES_SECS: u64 = 10 * 60;
    /// Semantic similarity result sets
    pub const SIMILARITY_SECS: u64 = 30 * 60;
    /// Reverse geocoding
    pub const GEOCODE_SECS: u64 = 24 * 60 * 60;
    /// In-process NLP memo
    pub const NLP_MEMO_SECS: u64 = 24 * 60 * 60;
}

/// Retrieval tuning.
pub mod retrieval {
    /// Weight of the semantic score in hybrid fusion
    pub const SEMANTIC_WEIGHT: f64 = 0.7;
    /// Weight of the keyword score in hybrid fusion
    pub const KEYWORD_WEIGHT: f64 = 0.3;
    /// Hard cap on semantic candidates per request
    pub const CANDIDATE_CAP: usize = 200;
    /// Vector fetches per micro-batch
    pub const VECTOR_FETCH_BATCH: usize = 25;
    /// Embedding components hashed into the similarity cache key
    pub const FINGERPRINT_COMPONENTS: usize = 10;
    /// Classifier confidence at which its category becomes authoritative
    pub const AUTHORITY_THRESHOLD: f64 = 0.7;
    /// Default result page size
    pub const PAGE_SIZE: usize = 20;
}

/// Ranking factor weights. Must sum to 1.0.
pub mod ranking {
    pub const RELEVANCE_WEIGHT: f64 = 0.50;
    pub const DISTANCE_WEIGHT: f64 = 0.15;
    pub const RATING_WEIGHT: f64 = 0.15;
    pub const REVIEWS_WEIGHT: f64 = 0.10;
    pub const VERIFIED_WEIGHT: f64 = 0.05;
    pub const RECENCY_WEIGHT: f64 = 0.05;
    /// Distance normalization ceiling in meters
    pub const DISTANCE_CEILING_M: f64 = 50_000.0;
    /// Recency window in days
    pub const RECENCY_WINDOW_DAYS: f64 = 30.0;
    /// Per-item cap on the keyword-in-name boost
    pub const NAME_BOOST_CAP: f64 = 0.25;
}

/// Rate limiter defaults (requests per hour).
pub mod limits {
    pub const PER_USER: u32 = 100;
    pub const PER_IP: u32 = 200;
    pub const GLOBAL: u32 = 1000;
    /// Per-call admission wait budget
    pub const WAIT_SLOT_MS: u64 = 5_000;
}

/// Model call policy.
pub mod model {
    /// Hard timeout per external model call
    pub const CALL_TIMEOUT_MS: u64 = 10_000;
    pub const MAX_RETRIES: u32 = 3;
    pub const INITIAL_BACKOFF_MS: u64 = 1_000;
}

/// Pipeline policy.
pub mod pipeline {
    /// Whole-request deadline
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;
    /// Queries are truncated to this many characters during sanitization
    pub const MAX_QUERY_CHARS: usize = 500;
    /// Profile locations older than this are marked stale
    pub const STALE_LOCATION_DAYS: i64 = 30;
    /// Default radius for user-centric searches, meters
    pub const DEFAULT_RADIUS_M: u32 = 5_000;
}
