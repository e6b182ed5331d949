use std::time::Duration;

use serde::{Deserialize, Serialize};

use batchrun_core::JobId;

/// An engine event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **ordered** per batch by their envelope sequence number
/// - renderable as one human-readable log line
pub trait Event: Clone + core::fmt::Debug + core::fmt::Display + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "job.retrying").
    fn event_type(&self) -> &'static str;

    /// Whether this event closes the batch stream.
    fn is_terminal(&self) -> bool;
}

/// Everything the engine reports while a batch runs.
///
/// Attempt numbers are 1-indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    BatchStarted {
        total: usize,
        max_concurrency: usize,
    },
    JobStarted {
        job_id: JobId,
        attempt: u32,
    },
    JobTimedOut {
        job_id: JobId,
        attempt: u32,
        timeout: Duration,
    },
    JobRetrying {
        job_id: JobId,
        /// Retry number about to be made (1-indexed).
        retry: u32,
        delay: Duration,
        error: String,
    },
    JobSucceeded {
        job_id: JobId,
        attempts: u32,
    },
    JobFailed {
        job_id: JobId,
        attempts: u32,
        error: String,
    },
    JobCancelled {
        job_id: JobId,
    },
    Progress {
        job_id: JobId,
        percent_delta: f64,
        cumulative: f64,
    },
    BatchCompleted {
        succeeded: usize,
        failed: usize,
    },
    BatchAborted {
        job_id: JobId,
        error: String,
    },
}

impl JobEvent {
    /// The job this event is about, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            JobEvent::JobStarted { job_id, .. }
            | JobEvent::JobTimedOut { job_id, .. }
            | JobEvent::JobRetrying { job_id, .. }
            | JobEvent::JobSucceeded { job_id, .. }
            | JobEvent::JobFailed { job_id, .. }
            | JobEvent::JobCancelled { job_id }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::BatchAborted { job_id, .. } => Some(job_id),
            JobEvent::BatchStarted { .. } | JobEvent::BatchCompleted { .. } => None,
        }
    }
}

impl Event for JobEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JobEvent::BatchStarted { .. } => "batch.started",
            JobEvent::JobStarted { .. } => "job.started",
            JobEvent::JobTimedOut { .. } => "job.timed_out",
            JobEvent::JobRetrying { .. } => "job.retrying",
            JobEvent::JobSucceeded { .. } => "job.succeeded",
            JobEvent::JobFailed { .. } => "job.failed",
            JobEvent::JobCancelled { .. } => "job.cancelled",
            JobEvent::Progress { .. } => "job.progress",
            JobEvent::BatchCompleted { .. } => "batch.completed",
            JobEvent::BatchAborted { .. } => "batch.aborted",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::BatchCompleted { .. } | JobEvent::BatchAborted { .. }
        )
    }
}

impl core::fmt::Display for JobEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JobEvent::BatchStarted {
                total,
                max_concurrency,
            } => write!(f, "Batch started: {total} jobs, concurrency {max_concurrency}"),
            JobEvent::JobStarted { job_id, attempt } => {
                write!(f, "Start loading: {job_id} ({attempt})")
            }
            JobEvent::JobTimedOut {
                job_id, timeout, ..
            } => write!(f, "Timeout: {job_id} ({}ms)", timeout.as_millis()),
            JobEvent::JobRetrying {
                job_id,
                retry,
                delay,
                error,
            } => write!(
                f,
                "Error loading {job_id}: {error}; waiting {}ms before retry {retry}",
                delay.as_millis()
            ),
            JobEvent::JobSucceeded { job_id, .. } => write!(f, "Loaded: {job_id}"),
            JobEvent::JobFailed {
                job_id,
                attempts,
                error,
            } => write!(f, "Load fail {job_id} after {attempts} attempts: {error}"),
            JobEvent::JobCancelled { job_id } => write!(f, "Cancelled: {job_id}"),
            JobEvent::Progress {
                job_id, cumulative, ..
            } => write!(f, "Progress: {cumulative:.0}% ({job_id} done)"),
            JobEvent::BatchCompleted { succeeded, failed } => {
                write!(f, "Batch completed: {succeeded} succeeded, {failed} failed")
            }
            JobEvent::BatchAborted { job_id, error } => {
                write!(f, "Batch aborted by {job_id}: {error}")
            }
        }
    }
}
