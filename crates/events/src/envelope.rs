use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use batchrun_core::BatchId;

/// Envelope for an event, containing batch + ordering metadata.
///
/// Notes:
/// - `sequence_number` is strictly increasing per batch, starting at 1.
/// - `occurred_at` is wall-clock time at publication.
/// - `payload` is the event itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    batch_id: BatchId,

    /// Monotonically increasing position in the batch stream.
    sequence_number: u64,

    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(batch_id: BatchId, sequence_number: u64, payload: E) -> Self {
        Self::at(batch_id, sequence_number, Utc::now(), payload)
    }

    pub fn at(
        batch_id: BatchId,
        sequence_number: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            batch_id,
            sequence_number,
            occurred_at,
            payload,
        }
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
