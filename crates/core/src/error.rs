//! Configuration error model.

use thiserror::Error;

use crate::id::JobId;

/// Result type used when building or validating batch configuration.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Invalid policy values.
///
/// Raised before any job is admitted and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The admission window must hold at least one job.
    #[error("max concurrency must be at least 1 (got {0})")]
    InvalidConcurrency(usize),

    /// The admission window is larger than the runtime can track.
    #[error("max concurrency {got} exceeds the limit of {max}")]
    ConcurrencyTooLarge { got: usize, max: usize },

    /// Every attempt needs a positive deadline.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// An identifier was invalid (e.g. empty job id).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A batch listed the same job twice.
    #[error("duplicate job id in batch: {0}")]
    DuplicateJobId(JobId),
}

impl ConfigurationError {
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
