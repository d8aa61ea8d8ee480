//! Fallback harness
//!
//! Converts thrown collaborator errors into result-carrying returns:
//! failures are classified, transient classes retried with exponential
//! backoff, and the rest substituted with the stage's declared fallback
//! value. A bounded event log keeps the last thousand substitutions for
//! diagnostics.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;

use localfind_core::Error;

/// Behavioral failure classes used for retry/fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Timeout,
    RateLimit,
    ApiError,
    Unknown,
}

impl FailureClass {
    /// Timeouts, throttles, and transient network failures are worth
    /// retrying; API rejections and unknowns are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureClass::Timeout | FailureClass::RateLimit)
    }
}

/// Classify an error by variant first, then by message patterns.
pub fn classify(error: &Error) -> FailureClass {
    match error {
        Error::Timeout(_) => return FailureClass::Timeout,
        Error::RateLimitTimeout { .. } => return FailureClass::RateLimit,
        _ => {}
    }

    let message = error.to_string().to_lowercase();

    const TIMEOUT_PATTERNS: &[&str] = &[
        "timeout",
        "timed out",
        "deadline",
        "connection reset",
        "connection refused",
        "broken pipe",
    ];
    const RATE_LIMIT_PATTERNS: &[&str] = &[
        "throttl",
        "rate limit",
        "too many requests",
        "429",
        "quota exceeded",
        "slow down",
    ];
    const API_PATTERNS: &[&str] = &[
        "access denied",
        "unauthorized",
        "forbidden",
        "invalid request",
        "bad request",
        "validation",
        "not found",
        "400",
        "401",
        "403",
    ];

    if RATE_LIMIT_PATTERNS.iter().any(|p| message.contains(p)) {
        FailureClass::RateLimit
    } else if TIMEOUT_PATTERNS.iter().any(|p| message.contains(p)) {
        FailureClass::Timeout
    } else if API_PATTERNS.iter().any(|p| message.contains(p)) {
        FailureClass::ApiError
    } else {
        FailureClass::Unknown
    }
}

/// Run an operation; on failure log the substitution and return the
/// fallback value together with the error that caused it.
pub async fn with_fallback<T, F, Fut>(
    operation_name: &str,
    op: F,
    fallback_value: T,
    log: Option<&FallbackLog>,
) -> (T, Option<Error>)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    match op().await {
        Ok(value) => (value, None),
        Err(error) => {
            let class = classify(&error);
            tracing::warn!(
                operation = operation_name,
                ?class,
                "operation failed, using fallback: {error}"
            );
            if let Some(log) = log {
                log.record(operation_name, class, &error);
            }
            (fallback_value, Some(error))
        }
    }
}

/// Retry an operation with exponential backoff. Only retryable classes are
/// retried; the last error is re-raised on exhaustion.
pub async fn retry_with_backoff<T, F, Fut>(
    op: F,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<T, Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut delay = initial_delay;
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let class = classify(&error);
                if attempt >= max_retries || !class.is_retryable() {
                    return Err(error);
                }
                attempt += 1;
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    ?class,
                    "retrying after failure: {error}"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

/// One recorded fallback substitution.
#[derive(Debug, Clone)]
pub struct FallbackEvent {
    pub operation: String,
    pub class: FailureClass,
    pub message: String,
}

const LOG_CAPACITY: usize = 1000;

/// Bounded ring buffer of recent fallback events.
#[derive(Default)]
pub struct FallbackLog {
    events: Mutex<VecDeque<FallbackEvent>>,
}

impl FallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: &str, class: FailureClass, error: &Error) {
        let mut events = self.events.lock();
        if events.len() >= LOG_CAPACITY {
            events.pop_front();
        }
        events.push_back(FallbackEvent {
            operation: operation.to_string(),
            class,
            message: error.to_string(),
        });
    }

    pub fn recent_events(&self) -> Vec<FallbackEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_classify_by_variant() {
        assert_eq!(classify(&Error::Timeout(30_000)), FailureClass::Timeout);
        assert_eq!(
            classify(&Error::RateLimitTimeout {
                scope: "global".to_string(),
                waited_ms: 5000
            }),
            FailureClass::RateLimit
        );
    }

    #[test]
    fn test_classify_by_message() {
        assert_eq!(
            classify(&Error::ModelUnavailable("ThrottlingException".to_string())),
            FailureClass::RateLimit
        );
        assert_eq!(
            classify(&Error::ModelUnavailable("request timed out".to_string())),
            FailureClass::Timeout
        );
        assert_eq!(
            classify(&Error::ModelUnavailable("access denied for model".to_string())),
            FailureClass::ApiError
        );
        assert_eq!(
            classify(&Error::Internal("something odd".to_string())),
            FailureClass::Unknown
        );
    }

    #[test]
    fn test_transient_network_is_timeout_class() {
        assert_eq!(
            classify(&Error::StoreUnavailable("connection reset by peer".to_string())),
            FailureClass::Timeout
        );
    }

    #[tokio::test]
    async fn test_with_fallback_passes_success_through() {
        let (value, error) =
            with_fallback("op", || async { Ok::<_, Error>(7) }, 0, None).await;
        assert_eq!(value, 7);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_with_fallback_substitutes_and_logs() {
        let log = FallbackLog::new();
        let (value, error) = with_fallback(
            "embed",
            || async { Err::<u32, _>(Error::ModelUnavailable("throttling".to_string())) },
            42,
            Some(&log),
        )
        .await;
        assert_eq!(value, 42);
        assert!(error.is_some());
        assert_eq!(log.len(), 1);
        assert_eq!(log.recent_events()[0].class, FailureClass::RateLimit);
    }

    #[tokio::test]
    async fn test_retry_retries_transient_and_doubles_delay() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::ModelUnavailable("timeout".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            },
            3,
            Duration::from_millis(5),
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_api_errors() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, _> = retry_with_backoff(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::ModelUnavailable("access denied".to_string())) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_reraises_last_error() {
        let result: Result<u32, _> = retry_with_backoff(
            || async { Err(Error::ModelUnavailable("throttling".to_string())) },
            2,
            Duration::from_millis(10),
        )
        .await;
        match result {
            Err(Error::ModelUnavailable(msg)) => assert!(msg.contains("throttling")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_log_is_bounded() {
        let log = FallbackLog::new();
        for i in 0..1100 {
            log.record(
                &format!("op{i}"),
                FailureClass::Unknown,
                &Error::Internal("x".to_string()),
            );
        }
        assert_eq!(log.len(), 1000);
        // Oldest entries were evicted
        assert_eq!(log.recent_events()[0].operation, "op100");
    }
}
