//! Projection runner utilities.
//!
//! Pins a projection to one batch stream and enforces strictly increasing
//! sequence numbers, so duplicated or foreign envelopes never reach it.

use batchrun_core::BatchId;
use thiserror::Error;

use crate::{EventEnvelope, Projection};

/// Tracks projection progress for a single batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProjectionCursor {
    batch_id: BatchId,
    last_sequence_number: u64,
}

impl ProjectionCursor {
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("envelope from batch {found} applied to projection of batch {expected}")]
    BatchMismatch { expected: BatchId, found: BatchId },
    #[error("sequence {found} is not after {last}")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Runs envelopes through a projection and tracks progress.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursor: Option<ProjectionCursor>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursor: None,
        }
    }

    /// Create a runner pinned to a specific batch.
    pub fn new_for_batch(batch_id: BatchId, projection: P) -> Self {
        Self {
            projection,
            cursor: Some(ProjectionCursor {
                batch_id,
                last_sequence_number: 0,
            }),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    pub fn cursor(&self) -> Option<ProjectionCursor> {
        self.cursor
    }

    /// Apply a single envelope, enforcing batch consistency and monotonic sequencing.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<(), ProjectionError> {
        let found_batch = envelope.batch_id();
        let found_seq = envelope.sequence_number();

        let next = match self.cursor {
            None => ProjectionCursor {
                batch_id: found_batch,
                last_sequence_number: found_seq,
            },
            Some(c) => {
                if c.batch_id != found_batch {
                    return Err(ProjectionError::BatchMismatch {
                        expected: c.batch_id,
                        found: found_batch,
                    });
                }
                if found_seq <= c.last_sequence_number {
                    return Err(ProjectionError::NonMonotonicSequence {
                        last: c.last_sequence_number,
                        found: found_seq,
                    });
                }
                ProjectionCursor {
                    last_sequence_number: found_seq,
                    ..c
                }
            }
        };

        self.projection.apply(envelope);
        self.cursor = Some(next);
        Ok(())
    }

    /// Apply many envelopes in order.
    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }

    /// Rebuild a projection from scratch by replaying a recorded stream.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(P, Option<ProjectionCursor>), ProjectionError>
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.run(envelopes)?;
        Ok((runner.projection, runner.cursor))
    }
}
