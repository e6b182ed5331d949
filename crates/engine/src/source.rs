//! Job sources: where the ordered job list comes from.

use std::time::Duration;

use async_trait::async_trait;

use batchrun_core::JobId;

use crate::error::EngineError;

/// Produces the ordered list of jobs for one batch.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn load_job_list(&self) -> Result<Vec<JobId>, EngineError>;
}

/// A fixed job list, optionally returned after a simulated load delay.
#[derive(Debug, Clone, Default)]
pub struct StaticJobSource {
    jobs: Vec<JobId>,
    load_delay: Duration,
}

impl StaticJobSource {
    pub fn new(jobs: impl IntoIterator<Item = JobId>) -> Self {
        Self {
            jobs: jobs.into_iter().collect(),
            load_delay: Duration::ZERO,
        }
    }

    /// Five files behind a 500ms config load.
    pub fn demo() -> Self {
        Self::new((0..5).map(|i| JobId::from(format!("file{i}"))))
            .with_load_delay(Duration::from_millis(500))
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

#[async_trait]
impl JobSource for StaticJobSource {
    async fn load_job_list(&self) -> Result<Vec<JobId>, EngineError> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        Ok(self.jobs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn demo_source_waits_then_lists_five_files() {
        let started = tokio::time::Instant::now();
        let jobs = StaticJobSource::demo().load_job_list().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        let names: Vec<_> = jobs.iter().map(JobId::as_str).collect();
        assert_eq!(names, ["file0", "file1", "file2", "file3", "file4"]);
    }
}
