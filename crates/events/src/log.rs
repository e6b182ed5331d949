use crate::{EventEnvelope, JobEvent, Projection};

/// Ordered human-readable log of a batch.
#[derive(Debug, Clone, Default)]
pub struct LogProjection {
    lines: Vec<String>,
}

impl LogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl Projection for LogProjection {
    type Ev = JobEvent;

    fn apply(&mut self, envelope: &EventEnvelope<JobEvent>) {
        // Progress has its own view.
        if matches!(envelope.payload(), JobEvent::Progress { .. }) {
            return;
        }
        self.lines.push(envelope.payload().to_string());
    }
}
