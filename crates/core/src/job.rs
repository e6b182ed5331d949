//! Per-job state machine driven by the retry controller.

use serde::{Deserialize, Serialize};

use crate::id::JobId;
use crate::policy::RetryPolicy;

/// Job execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Admitted, no attempt made yet
    Pending,
    /// An attempt is running
    Attempting,
    /// Waiting out the delay before the next attempt
    Backoff,
    /// Completed successfully
    Succeeded,
    /// Exhausted retries, last failure was a network error
    FailedFinal,
    /// Exhausted retries, last failure was a timeout
    TimedOut,
    /// Stopped because the batch was aborted
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::FailedFinal | JobState::TimedOut | JobState::Cancelled
        )
    }

    /// States that occupy a slot in the admission window.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::Attempting | JobState::Backoff)
    }
}

/// Kind of failure observed for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
}

/// What happens after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterFailure {
    /// Wait, then make retry number `retry` (1-indexed).
    Retry { retry: u32 },
    /// No attempts left.
    GiveUp,
}

/// A job owned by exactly one retry controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: JobId,
    /// Failed attempts so far (starts at 0)
    attempt: u32,
    state: JobState,
}

impl Job {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            attempt: 0,
            state: JobState::Pending,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Number of failed attempts.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// 1-indexed number of the attempt currently running (or last run).
    pub fn attempt_number(&self) -> u32 {
        self.attempt + 1
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Pending/Backoff -> Attempting.
    pub fn mark_attempting(&mut self) {
        debug_assert!(matches!(self.state, JobState::Pending | JobState::Backoff));
        self.state = JobState::Attempting;
    }

    /// Attempting -> Succeeded.
    pub fn mark_succeeded(&mut self) {
        debug_assert_eq!(self.state, JobState::Attempting);
        self.state = JobState::Succeeded;
    }

    /// Attempting -> Backoff | FailedFinal | TimedOut.
    ///
    /// Counts the failure first, then consults the policy.
    pub fn mark_failed(&mut self, kind: FailureKind, policy: &RetryPolicy) -> AfterFailure {
        debug_assert_eq!(self.state, JobState::Attempting);
        self.attempt += 1;

        if policy.should_retry(self.attempt) {
            self.state = JobState::Backoff;
            AfterFailure::Retry {
                retry: self.attempt,
            }
        } else {
            self.state = match kind {
                FailureKind::Network => JobState::FailedFinal,
                FailureKind::Timeout => JobState::TimedOut,
            };
            AfterFailure::GiveUp
        }
    }

    /// Any non-terminal state -> Cancelled.
    pub fn mark_cancelled(&mut self) {
        if !self.state.is_terminal() {
            self.state = JobState::Cancelled;
        }
    }
}
