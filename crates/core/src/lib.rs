//! `batchrun-core`: job model and batch policies.
//!
//! This crate is **pure**: no runtime, no IO. The engine crate drives these
//! types; events and projections only read them.

pub mod error;
pub mod id;
pub mod job;
pub mod policy;

pub use error::{ConfigResult, ConfigurationError};
pub use id::{BatchId, JobId};
pub use job::{AfterFailure, FailureKind, Job, JobState};
pub use policy::{
    BackoffStrategy, BatchConfig, FailureMode, MAX_CONCURRENCY, RetryPolicy, TimeoutPolicy,
};
