//! Batch policies: retry, timeout, failure handling and admission window.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, ConfigurationError};

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(retry - 1)
    #[default]
    Exponential,
    /// Linear backoff: base * retry
    Linear,
}

/// Retry policy for a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Optional delay cap
    pub max_delay: Option<Duration>,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(100))
    }
}

impl RetryPolicy {
    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create a policy with fixed delays.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: delay,
            max_delay: None,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Create a policy with uncapped exponential backoff.
    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: None,
            strategy: BackoffStrategy::Exponential,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Total attempts a job gets before it is failed for good.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait before retry `retry` (1-indexed).
    ///
    /// Retry 0 is the first attempt and never waits.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(retry),
        };

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Whether a job that has failed `failures` times may be retried.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }
}

/// Deadline applied to every attempt of every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    pub timeout: Duration,
}

impl TimeoutPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::from_millis(2500)
    }
}

/// What the batch does when a job exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Abort the batch on the first unrecoverable job failure.
    #[default]
    FailFast,
    /// Run every job to its terminal state and report all outcomes.
    CollectAll,
}

impl core::str::FromStr for FailureMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_fast" | "fail-fast" => Ok(Self::FailFast),
            "collect_all" | "collect-all" => Ok(Self::CollectAll),
            other => Err(ConfigurationError::invalid_value(
                "failure_mode",
                format!("unknown mode {other:?}"),
            )),
        }
    }
}

/// Largest admission window a batch accepts.
///
/// Matches `tokio::sync::Semaphore::MAX_PERMITS`, the gate the scheduler
/// builds from `max_concurrency`.
pub const MAX_CONCURRENCY: usize = usize::MAX >> 3;

/// Everything a batch run needs besides its job list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    pub timeout: TimeoutPolicy,
    pub failure_mode: FailureMode,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            retry: RetryPolicy::default(),
            timeout: TimeoutPolicy::default(),
            failure_mode: FailureMode::FailFast,
        }
    }
}

impl BatchConfig {
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = TimeoutPolicy::new(timeout);
        self
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrency < 1 {
            return Err(ConfigurationError::InvalidConcurrency(self.max_concurrency));
        }
        if self.max_concurrency > MAX_CONCURRENCY {
            return Err(ConfigurationError::ConcurrencyTooLarge {
                got: self.max_concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        if self.timeout.timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout);
        }
        Ok(())
    }
}
