//! Admission control and failure handling
//!
//! Two cooperating pieces sit between the pipeline and every external model
//! call:
//! - a sliding-window rate limiter with per-user, per-ip, and global
//!   windows and FIFO queued waiters
//! - a fallback harness that classifies failures, retries the transient
//!   classes with exponential backoff, and substitutes degraded results

pub mod fallback;
pub mod rate_limit;

pub use fallback::{
    classify, retry_with_backoff, with_fallback, FailureClass, FallbackEvent, FallbackLog,
};
pub use rate_limit::{Admission, RateLimiter, RateLimiterConfig, ScopeStatus};
