//! Engine events, the bus that carries them, and the projections that
//! consume them.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod log;
pub mod progress;
pub mod projection;
pub mod runner;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::{Event, JobEvent};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use log::LogProjection;
pub use progress::{ProgressProjection, ProgressStep, ProgressTracker};
pub use projection::Projection;
pub use runner::{ProjectionCursor, ProjectionError, ProjectionRunner};
