//! In-process batch job engine.
//!
//! ## Design
//!
//! - A batch of named jobs runs under a global concurrency cap
//! - Each attempt is raced against a per-job deadline
//! - Failed attempts are retried with exponential backoff
//! - Every stage transition is published as an event; the engine keeps no
//!   display state
//!
//! ## Components
//!
//! - `TimeoutGuard`: races one attempt against its deadline
//! - `RetryController`: bounded retries and backoff around the guard
//! - `Scheduler`: sliding admission window, progress, fail-fast/collect-all
//! - `JobExecutor` / `JobSource`: the caller-supplied operations

pub mod config;
pub mod emitter;
pub mod error;
pub mod executor;
pub mod retry;
pub mod scheduler;
pub mod source;
pub mod timeout;

pub use emitter::EventEmitter;
pub use error::{
    AttemptError, EngineError, JobError, NetworkError, RetriesExhaustedError, TimeoutError,
};
pub use executor::{FnExecutor, JobExecutor, SimulatedExecutor};
pub use retry::RetryController;
pub use scheduler::{BatchReport, BatchStats, InFlightGauge, JobOutcome, Outcome, Scheduler};
pub use source::{JobSource, StaticJobSource};
pub use timeout::TimeoutGuard;
