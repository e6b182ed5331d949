//! Progress accounting.
//!
//! `ProgressTracker` is the writer side (owned by the scheduler);
//! `ProgressProjection` is the reader side (UI, tests).

use std::collections::HashSet;

use batchrun_core::JobId;

use crate::{EventEnvelope, JobEvent, Projection};

/// Counts terminal jobs and turns each into a percentage step.
///
/// The cumulative value is derived from the completed count, never summed,
/// so the last step of a batch lands on exactly 100.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    completed: usize,
    cumulative: f64,
}

/// One progress step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressStep {
    pub percent_delta: f64,
    pub cumulative: f64,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            cumulative: 0.0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn cumulative(&self) -> f64 {
        self.cumulative
    }

    /// Account one more terminal job.
    ///
    /// Returns `None` once every job has been accounted.
    pub fn complete_one(&mut self) -> Option<ProgressStep> {
        if self.completed >= self.total {
            return None;
        }
        self.completed += 1;

        let cumulative = if self.completed == self.total {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        };
        let step = ProgressStep {
            percent_delta: cumulative - self.cumulative,
            cumulative,
        };
        self.cumulative = cumulative;
        Some(step)
    }
}

/// Current progress of a batch as seen by a consumer.
#[derive(Debug, Clone, Default)]
pub struct ProgressProjection {
    total: Option<usize>,
    done: HashSet<JobId>,
    percent: f64,
}

impl ProgressProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative percentage in `[0, 100]`.
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Jobs that have reported a terminal state.
    pub fn jobs_done(&self) -> usize {
        self.done.len()
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }

    /// Text progress bar, e.g. `[######    ]  60%`.
    pub fn render_bar(&self, width: usize) -> String {
        let filled = ((self.percent / 100.0) * width as f64).round() as usize;
        let filled = filled.min(width);
        format!(
            "[{}{}] {:>3.0}%",
            "#".repeat(filled),
            " ".repeat(width - filled),
            self.percent
        )
    }
}

impl Projection for ProgressProjection {
    type Ev = JobEvent;

    fn apply(&mut self, envelope: &EventEnvelope<JobEvent>) {
        match envelope.payload() {
            JobEvent::BatchStarted { total, .. } => {
                self.total = Some(*total);
                self.done.clear();
                self.percent = 0.0;
            }
            JobEvent::Progress {
                job_id, cumulative, ..
            } => {
                // Job ids are unique per batch; a replayed event is counted once.
                if self.done.insert(job_id.clone()) {
                    self.percent = self.percent.max(*cumulative).min(100.0);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchrun_core::BatchId;

    fn progress(batch: BatchId, seq: u64, job: &str, step: ProgressStep) -> EventEnvelope<JobEvent> {
        EventEnvelope::new(
            batch,
            seq,
            JobEvent::Progress {
                job_id: JobId::from(job),
                percent_delta: step.percent_delta,
                cumulative: step.cumulative,
            },
        )
    }

    #[test]
    fn tracker_ends_at_exactly_one_hundred() {
        let mut tracker = ProgressTracker::new(3);

        let steps: Vec<_> = std::iter::from_fn(|| tracker.complete_one()).collect();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].cumulative, 100.0);
        assert!(tracker.complete_one().is_none());
    }

    #[test]
    fn empty_batch_never_steps() {
        let mut tracker = ProgressTracker::new(0);
        assert!(tracker.complete_one().is_none());
        assert_eq!(tracker.cumulative(), 0.0);
    }

    #[test]
    fn projection_counts_each_job_once() {
        let batch = BatchId::new();
        let mut tracker = ProgressTracker::new(2);
        let mut view = ProgressProjection::new();

        let first = tracker.complete_one().unwrap();
        view.apply(&progress(batch, 1, "file0", first));
        view.apply(&progress(batch, 2, "file0", first));
        assert_eq!(view.jobs_done(), 1);
        assert_eq!(view.percent(), 50.0);

        let second = tracker.complete_one().unwrap();
        view.apply(&progress(batch, 3, "file1", second));
        assert!(view.is_complete());
        assert_eq!(view.render_bar(10), "[##########] 100%");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: any batch size accounts to exactly 100 with positive steps.
            #[test]
            fn steps_sum_to_one_hundred(total in 1usize..500) {
                let mut tracker = ProgressTracker::new(total);
                let mut sum = 0.0;
                let mut last = None;

                while let Some(step) = tracker.complete_one() {
                    prop_assert!(step.percent_delta > 0.0);
                    sum += step.percent_delta;
                    last = Some(step);
                }

                prop_assert_eq!(tracker.completed(), total);
                prop_assert_eq!(last.map(|s| s.cumulative), Some(100.0));
                prop_assert!((sum - 100.0).abs() < 1e-6);
            }
        }
    }
}
