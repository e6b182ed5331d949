//! The demo flow: load the job list, run it, initialize the system.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use batchrun_core::{BatchConfig, JobId};
use batchrun_engine::{BatchReport, EngineError, JobExecutor, JobSource, Scheduler};
use batchrun_events::{
    Event, EventBus, EventEnvelope, InMemoryEventBus, JobEvent, LogProjection,
    ProgressProjection, ProjectionRunner, Subscription,
};

use crate::console::Console;

pub const STARTED_BANNER: &str = "******** Process Started ********";
pub const INIT_STEP: &str = "[Step 3] Initializing System...";
pub const DONE_BANNER: &str = "******** DONE! ********";

const PROGRESS_BAR_WIDTH: usize = 20;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JobEvent>>>;

/// Runs one batch end to end and narrates it on a console.
pub struct Pipeline<C: ?Sized> {
    console: Arc<C>,
    config: BatchConfig,
    init_delay: Duration,
}

impl<C> Pipeline<C>
where
    C: Console + ?Sized + 'static,
{
    pub fn new(console: Arc<C>, config: BatchConfig) -> Self {
        Self {
            console,
            config,
            init_delay: Duration::from_millis(500),
        }
    }

    /// Duration of the initialization step that follows a successful batch.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Run the whole flow.
    ///
    /// Any failure is printed as `Critical Error: <error>` and returned; the
    /// initialization step only runs after a successful batch.
    pub async fn run<S, X>(
        &self,
        source: &S,
        executor: X,
    ) -> Result<BatchReport<X::Output>, EngineError>
    where
        S: JobSource + ?Sized,
        X: JobExecutor,
    {
        self.console.line(STARTED_BANNER);

        let result = self.run_stages(source, executor).await;
        if let Err(e) = &result {
            self.console.line(&format!("Critical Error: {e}"));
        }
        result
    }

    async fn run_stages<S, X>(
        &self,
        source: &S,
        executor: X,
    ) -> Result<BatchReport<X::Output>, EngineError>
    where
        S: JobSource + ?Sized,
        X: JobExecutor,
    {
        let jobs = source.load_job_list().await?;
        let names: Vec<&str> = jobs.iter().map(JobId::as_str).collect();
        self.console.line(&format!("FileList: {}", names.join(",")));

        let report = self.run_batch(jobs, executor).await?;
        info!(
            batch_id = %report.batch_id,
            succeeded = report.stats.jobs_succeeded,
            peak_in_flight = report.stats.peak_in_flight,
            "batch finished"
        );

        self.init_system().await;
        Ok(report)
    }

    async fn run_batch<X>(
        &self,
        jobs: Vec<JobId>,
        executor: X,
    ) -> Result<BatchReport<X::Output>, EngineError>
    where
        X: JobExecutor,
    {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let scheduler = Scheduler::new(executor, bus.clone(), self.config.clone())?;

        let subscription = bus.subscribe();
        let console = Arc::clone(&self.console);
        let renderer =
            tokio::task::spawn_blocking(move || render(&subscription, console.as_ref()));

        let result = scheduler.run_batch(jobs).await;

        // Closing the bus ends the renderer even without a terminal event.
        drop(scheduler);
        drop(bus);
        let rendered = renderer.await;

        let report = result?;
        rendered.map_err(|e| EngineError::TaskPanicked(e.to_string()))?;
        Ok(report)
    }

    async fn init_system(&self) {
        self.console.line(INIT_STEP);
        tokio::time::sleep(self.init_delay).await;
        self.console.line(DONE_BANNER);
    }
}

/// Print each event as it arrives, progress as a bar, until the batch ends.
fn render<C>(subscription: &Subscription<EventEnvelope<JobEvent>>, console: &C)
where
    C: Console + ?Sized,
{
    let mut log = ProjectionRunner::new(LogProjection::new());
    let mut progress = ProjectionRunner::new(ProgressProjection::new());

    while let Ok(envelope) = subscription.recv() {
        if let Err(e) = log.apply(&envelope).and_then(|()| progress.apply(&envelope)) {
            warn!(error = %e, "skipping event");
            continue;
        }

        match envelope.payload() {
            JobEvent::Progress { .. } => {
                console.line(&progress.projection().render_bar(PROGRESS_BAR_WIDTH));
            }
            _ => {
                if let Some(line) = log.projection().last() {
                    console.line(line);
                }
            }
        }

        if envelope.payload().is_terminal() {
            break;
        }
    }
}
