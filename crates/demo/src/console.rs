//! Where the pipeline writes its human-readable output.

use std::sync::{Arc, Mutex};

/// A line-oriented output sink.
pub trait Console: Send + Sync {
    fn line(&self, text: &str);
}

/// Writes to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn line(&self, text: &str) {
        println!("{text}");
    }
}

/// Keeps every line in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryConsole {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Console for MemoryConsole {
    fn line(&self, text: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(text.to_string());
    }
}
