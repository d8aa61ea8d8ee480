//! Pipeline telemetry
//!
//! Built during one request and returned alongside the results. Steps are
//! appended in execution order; errors are non-fatal messages tagged with
//! their behavioral kind.

use std::time::Instant;

use serde::Serialize;

use crate::error::ErrorKind;

/// One recorded pipeline step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub duration_ms: u64,
    pub from_cache: bool,
    pub error: Option<String>,
}

/// A non-fatal error recorded during the request.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Per-request performance record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineTelemetry {
    pub steps: Vec<StepRecord>,
    pub model_calls: u32,
    pub cache_hits: u32,
    pub errors: Vec<RecordedError>,
    pub partial_results: bool,
    pub total_ms: u64,
}

impl PipelineTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self, name: impl Into<String>, started: Instant, from_cache: bool) {
        self.steps.push(StepRecord {
            name: name.into(),
            duration_ms: started.elapsed().as_millis() as u64,
            from_cache,
            error: None,
        });
        if from_cache {
            self.cache_hits += 1;
        }
    }

    pub fn record_step_error(
        &mut self,
        name: impl Into<String>,
        started: Instant,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        let message = message.into();
        self.steps.push(StepRecord {
            name: name.into(),
            duration_ms: started.elapsed().as_millis() as u64,
            from_cache: false,
            error: Some(message.clone()),
        });
        self.errors.push(RecordedError { kind, message });
    }

    pub fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(RecordedError {
            kind,
            message: message.into(),
        });
    }

    pub fn record_model_call(&mut self) {
        self.model_calls += 1;
    }

    /// Whether any recorded error justifies a partial-failure response when
    /// the result list is empty.
    pub fn has_critical_error(&self) -> bool {
        self.errors.iter().any(|e| e.kind.is_critical())
    }
}

/// Scoped timer for one step.
pub struct StepTimer {
    started: Instant,
}

impl StepTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
