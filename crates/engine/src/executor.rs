//! Job executors: the operation each attempt runs.

use std::future::Future;
use std::ops::Range;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use batchrun_core::JobId;

use crate::error::NetworkError;

/// Runs one attempt of a job.
///
/// Implementations must be cancel-safe: the timeout guard and batch
/// cancellation drop the returned future when they win the race.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn execute(&self, job_id: &JobId) -> Result<Self::Output, NetworkError>;
}

/// Executor backed by an async closure.
pub struct FnExecutor<F> {
    handler: F,
}

impl<F> FnExecutor<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F, Fut, T> JobExecutor for FnExecutor<F>
where
    F: Fn(JobId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, NetworkError>> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    async fn execute(&self, job_id: &JobId) -> Result<T, NetworkError> {
        (self.handler)(job_id.clone()).await
    }
}

/// Simulated loader: random latency, random network failures.
///
/// Defaults reproduce the demo: latency uniform in `[0, 3000ms)` and a 30%
/// failure chance per attempt. Successful attempts return `"Data:<job>"`.
#[derive(Debug)]
pub struct SimulatedExecutor {
    latency: Range<Duration>,
    failure_rate: f64,
    rng: Mutex<StdRng>,
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(Duration::ZERO..Duration::from_millis(3000), 0.3)
    }
}

impl SimulatedExecutor {
    pub fn new(latency: Range<Duration>, failure_rate: f64) -> Self {
        Self {
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn roll(&self) -> (Duration, bool) {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let delay = if self.latency.is_empty() {
            self.latency.start
        } else {
            rng.gen_range(self.latency.clone())
        };
        (delay, rng.gen_bool(self.failure_rate))
    }
}

#[async_trait]
impl JobExecutor for SimulatedExecutor {
    type Output = String;

    async fn execute(&self, job_id: &JobId) -> Result<String, NetworkError> {
        // Roll before suspending; the rng guard must not live across the await.
        let (delay, fails) = self.roll();
        tokio::time::sleep(delay).await;

        if fails {
            Err(NetworkError::new(
                job_id.clone(),
                format!("Network error loading {job_id}"),
            ))
        } else {
            Ok(format!("Data:{job_id}"))
        }
    }
}
