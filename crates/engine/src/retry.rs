//! Retry controller: bounded retries with backoff around the timeout guard.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use batchrun_core::{AfterFailure, Job, JobId, RetryPolicy};
use batchrun_events::{EventBus, EventEnvelope, JobEvent};

use crate::emitter::EventEmitter;
use crate::error::{JobError, RetriesExhaustedError};
use crate::executor::JobExecutor;
use crate::timeout::TimeoutGuard;

/// Drives one job through `Pending → Attempting → {Succeeded | Backoff →
/// Attempting | FailedFinal | TimedOut}`.
///
/// A job gets exactly `max_retries + 1` attempts. Backoff only suspends the
/// job's own task. Once `cancel` fires the controller stops at the current
/// suspension point and publishes nothing further.
pub struct RetryController<B> {
    policy: RetryPolicy,
    guard: TimeoutGuard<B>,
    events: EventEmitter<B>,
}

impl<B> RetryController<B>
where
    B: EventBus<EventEnvelope<JobEvent>>,
{
    pub fn new(policy: RetryPolicy, guard: TimeoutGuard<B>, events: EventEmitter<B>) -> Self {
        Self {
            policy,
            guard,
            events,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute_with_retry<X>(
        &self,
        job_id: &JobId,
        executor: &X,
        cancel: &CancellationToken,
    ) -> Result<X::Output, JobError>
    where
        X: JobExecutor + ?Sized,
    {
        let mut job = Job::new(job_id.clone());

        loop {
            job.mark_attempting();
            let attempt = job.attempt_number();
            debug!(%job_id, attempt, "attempt started");
            self.events.emit(JobEvent::JobStarted {
                job_id: job_id.clone(),
                attempt,
            });

            let settled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&mut job)),
                settled = self.guard.with_timeout(job_id, attempt, executor.execute(job_id)) => settled,
            };

            let error = match settled {
                Ok(value) => {
                    job.mark_succeeded();
                    self.events.emit(JobEvent::JobSucceeded {
                        job_id: job_id.clone(),
                        attempts: attempt,
                    });
                    return Ok(value);
                }
                Err(error) => error,
            };

            match job.mark_failed(error.kind(), &self.policy) {
                AfterFailure::Retry { retry } => {
                    let delay = self.policy.delay_for_retry(retry);
                    self.events.emit(JobEvent::JobRetrying {
                        job_id: job_id.clone(),
                        retry,
                        delay,
                        error: error.to_string(),
                    });

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(&mut job)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                AfterFailure::GiveUp => {
                    self.events.emit(JobEvent::JobFailed {
                        job_id: job_id.clone(),
                        attempts: job.attempt(),
                        error: error.to_string(),
                    });
                    return Err(JobError::Exhausted(RetriesExhaustedError {
                        job_id: job_id.clone(),
                        attempts: job.attempt(),
                        cause: error,
                    }));
                }
            }
        }
    }
}

fn cancelled(job: &mut Job) -> JobError {
    job.mark_cancelled();
    debug!(job_id = %job.id(), state = ?job.state(), "attempt abandoned");
    JobError::Cancelled {
        job_id: job.id().clone(),
    }
}
