//! Batch-scoped event publisher.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use batchrun_core::BatchId;
use batchrun_events::{Event, EventBus, EventEnvelope, JobEvent};

/// Wraps engine events in envelopes and publishes them on the bus.
///
/// Sequence numbers are assigned and published under one lock, so the bus
/// order always equals the sequence order even when job tasks run on
/// several worker threads. Every event is mirrored to `tracing`.
pub struct EventEmitter<B> {
    bus: B,
    batch_id: BatchId,
    sequence: Arc<Mutex<u64>>,
}

impl<B: Clone> Clone for EventEmitter<B> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            batch_id: self.batch_id,
            sequence: Arc::clone(&self.sequence),
        }
    }
}

impl<B> EventEmitter<B>
where
    B: EventBus<EventEnvelope<JobEvent>>,
{
    pub fn new(bus: B, batch_id: BatchId) -> Self {
        Self {
            bus,
            batch_id,
            sequence: Arc::new(Mutex::new(0)),
        }
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Publish one event. Bus failures are logged, never propagated.
    pub fn emit(&self, event: JobEvent) {
        trace_event(self.batch_id, &event);

        let mut sequence = match self.sequence.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *sequence += 1;

        let envelope = EventEnvelope::new(self.batch_id, *sequence, event);
        if let Err(e) = self.bus.publish(envelope) {
            warn!(batch_id = %self.batch_id, error = ?e, "failed to publish event");
        }
    }
}

fn trace_event(batch_id: BatchId, event: &JobEvent) {
    let kind = event.event_type();
    match event {
        JobEvent::BatchStarted { .. } | JobEvent::BatchCompleted { .. } => {
            info!(%batch_id, kind, "{event}")
        }
        JobEvent::JobTimedOut { job_id, attempt, .. } => {
            warn!(%batch_id, %job_id, attempt, kind, "{event}")
        }
        JobEvent::JobRetrying { job_id, retry, .. } => {
            warn!(%batch_id, %job_id, retry, kind, "{event}")
        }
        JobEvent::JobFailed { job_id, attempts, .. } => {
            warn!(%batch_id, %job_id, attempts, kind, "{event}")
        }
        JobEvent::BatchAborted { job_id, .. } => error!(%batch_id, %job_id, kind, "{event}"),
        _ => debug!(%batch_id, job_id = ?event.job_id(), kind, "{event}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchrun_core::JobId;
    use batchrun_events::InMemoryEventBus;

    #[test]
    fn sequence_numbers_start_at_one_and_are_shared_by_clones() {
        let bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();
        let emitter = EventEmitter::new(bus.clone(), BatchId::new());
        let clone = emitter.clone();

        emitter.emit(JobEvent::JobStarted {
            job_id: JobId::from("file0"),
            attempt: 1,
        });
        clone.emit(JobEvent::JobCancelled {
            job_id: JobId::from("file1"),
        });

        let seen: Vec<_> = subscription
            .drain()
            .into_iter()
            .map(|e| (e.sequence_number(), e.batch_id()))
            .collect();
        assert_eq!(
            seen,
            vec![(1, emitter.batch_id()), (2, emitter.batch_id())]
        );
    }
}
