//! Error taxonomy of the engine.
//!
//! Attempt-level errors (`NetworkError`, `TimeoutError`) stay inside the
//! retry controller. Only exhaustion, cancellation and batch-level failures
//! travel further up.

use std::time::Duration;

use thiserror::Error;

use batchrun_core::{ConfigurationError, FailureKind, JobId};

/// Transient failure raised by a job executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NetworkError {
    pub job_id: JobId,
    pub message: String,
}

impl NetworkError {
    pub fn new(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            job_id,
            message: message.into(),
        }
    }
}

/// An attempt did not settle before its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{job_id} timed out after {}ms", .timeout.as_millis())]
pub struct TimeoutError {
    pub job_id: JobId,
    pub timeout: Duration,
}

/// Failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl AttemptError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AttemptError::Network(_) => FailureKind::Network,
            AttemptError::Timeout(_) => FailureKind::Timeout,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AttemptError::Timeout(_))
    }
}

/// A job used up every attempt its policy allows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{job_id} failed after {attempts} attempts: {cause}")]
pub struct RetriesExhaustedError {
    pub job_id: JobId,
    pub attempts: u32,
    #[source]
    pub cause: AttemptError,
}

/// Terminal failure of one job task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error(transparent)]
    Exhausted(#[from] RetriesExhaustedError),
    #[error("{job_id} cancelled")]
    Cancelled { job_id: JobId },
}

/// Batch-level failure returned by the scheduler.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    RetriesExhausted(#[from] RetriesExhaustedError),

    #[error("job task panicked: {0}")]
    TaskPanicked(String),

    #[error("failed to load job list: {0}")]
    Source(String),
}

impl EngineError {
    /// The exhausted job's error, when that is what aborted the batch.
    pub fn as_exhausted(&self) -> Option<&RetriesExhaustedError> {
        match self {
            EngineError::RetriesExhausted(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn exhausted_error_exposes_its_cause() {
        let cause = AttemptError::from(TimeoutError {
            job_id: JobId::from("file2"),
            timeout: Duration::from_millis(2500),
        });
        let err = RetriesExhaustedError {
            job_id: JobId::from("file2"),
            attempts: 4,
            cause,
        };

        assert_eq!(
            err.to_string(),
            "file2 failed after 4 attempts: file2 timed out after 2500ms"
        );
        assert!(err.source().is_some());
        assert!(err.cause.is_timeout());
        assert_eq!(err.cause.kind(), FailureKind::Timeout);
    }

    #[test]
    fn network_error_displays_its_message() {
        let err = NetworkError::new(JobId::from("file1"), "Network error loading file1");
        assert_eq!(AttemptError::from(err).to_string(), "Network error loading file1");
    }
}
