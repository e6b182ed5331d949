//! Timeout guard: races one attempt against its deadline.

use std::future::Future;

use batchrun_core::{JobId, TimeoutPolicy};
use batchrun_events::{EventBus, EventEnvelope, JobEvent};

use crate::emitter::EventEmitter;
use crate::error::{AttemptError, NetworkError, TimeoutError};

/// Races an attempt against the policy deadline.
///
/// Settlement is exactly-once: `tokio::time::timeout` resolves to either the
/// operation's result or the elapsed deadline, never both. When the deadline
/// wins, the operation future is dropped, so a late result can never be
/// observed. When the operation wins, the timer is dropped with it.
///
/// On a timeout the `JobTimedOut` event is always published before the error
/// is handed back to the caller.
pub struct TimeoutGuard<B> {
    policy: TimeoutPolicy,
    events: EventEmitter<B>,
}

impl<B: Clone> Clone for TimeoutGuard<B> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy,
            events: self.events.clone(),
        }
    }
}

impl<B> TimeoutGuard<B>
where
    B: EventBus<EventEnvelope<JobEvent>>,
{
    pub fn new(policy: TimeoutPolicy, events: EventEmitter<B>) -> Self {
        Self { policy, events }
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    /// Run `operation` (attempt number `attempt`, 1-indexed) under the deadline.
    ///
    /// A zero timeout fails at once without polling the operation.
    pub async fn with_timeout<F, T>(
        &self,
        job_id: &JobId,
        attempt: u32,
        operation: F,
    ) -> Result<T, AttemptError>
    where
        F: Future<Output = Result<T, NetworkError>>,
    {
        let timeout = self.policy.timeout;
        if timeout.is_zero() {
            return Err(self.timed_out(job_id, attempt));
        }

        match tokio::time::timeout(timeout, operation).await {
            Ok(settled) => settled.map_err(AttemptError::from),
            Err(_elapsed) => Err(self.timed_out(job_id, attempt)),
        }
    }

    fn timed_out(&self, job_id: &JobId, attempt: u32) -> AttemptError {
        let timeout = self.policy.timeout;
        self.events.emit(JobEvent::JobTimedOut {
            job_id: job_id.clone(),
            attempt,
            timeout,
        });
        AttemptError::Timeout(TimeoutError {
            job_id: job_id.clone(),
            timeout,
        })
    }
}
