use crate::{Event, EventEnvelope};

/// A projection folds a batch's event stream into a view (progress bar,
/// console log, test assertions).
///
/// Projections are pure consumers: they never talk back to the engine and
/// can be rebuilt at any time by replaying the envelopes of a batch.
///
/// ## Idempotency
///
/// A bus may be shared by several subscribers and replays are allowed, so
/// applying the same envelope twice should not double-count. `ProjectionRunner`
/// enforces this by rejecting non-increasing sequence numbers; projections
/// that are applied directly should guard on their own (see
/// `ProgressProjection`).
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the view.
    ///
    /// Events the projection does not care about are ignored.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
