//! Error taxonomy for the analysis engine.
//!
//! Two layers: [`StageError`] for faults inside a single stage (these never
//! escape the executor — they become `Failed` stage results), and
//! [`AnalysisError`] for the two conditions that fail an `analyze` call as
//! a whole: an empty document, or the executor itself breaking (a bug, not
//! a normal outcome).

use serde::Serialize;
use thiserror::Error;

/// Classifies a stage fault for the retry predicate and the result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// Network/connection-level failure; eligible for retry with backoff.
    Transient,
    /// Parsing or logic fault, including caught panics; never retried.
    Internal,
    /// The external service answered definitively with no result.
    NotFound,
}

/// A fault raised by one stage adapter during one attempt.
#[derive(Debug, Clone, Error)]
#[error("{kind:?} stage error: {message}")]
pub struct StageError {
    pub kind: StageErrorKind,
    pub message: String,
}

impl StageError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: StageErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: StageErrorKind::Internal,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: StageErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == StageErrorKind::Transient
    }
}

/// Fatal outcome of an `analyze` call. Per-stage faults are not represented
/// here — they surface as stage statuses inside the returned result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The document had no extractable text; rejected before any stage ran.
    #[error("document '{0}' contains no text to analyze")]
    EmptyDocument(String),
    /// The executor returned without producing any stage outcome.
    #[error("stage executor produced no results: {0}")]
    Executor(String),
}
