//! Console front-end for the batch engine.
//!
//! Loads the job list, runs it as one batch while streaming the engine's
//! events to a [`Console`], then runs the system initialization step.

pub mod console;
pub mod pipeline;

pub use console::{Console, MemoryConsole, StdoutConsole};
pub use pipeline::Pipeline;
