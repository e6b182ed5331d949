//! Concurrency scheduler: sliding admission window over a batch of jobs.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use batchrun_core::{BatchConfig, BatchId, ConfigurationError, FailureMode, JobId};
use batchrun_events::{EventBus, EventEnvelope, JobEvent, ProgressTracker};

use crate::emitter::EventEmitter;
use crate::error::{EngineError, JobError, RetriesExhaustedError};
use crate::executor::JobExecutor;
use crate::retry::RetryController;
use crate::timeout::TimeoutGuard;

/// Terminal result of one job.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Succeeded(T),
    Failed(RetriesExhaustedError),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Succeeded(v) => Some(v),
            _ => None,
        }
    }
}

/// Outcome of one job, tagged with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome<T> {
    pub job_id: JobId,
    pub outcome: Outcome<T>,
}

/// Batch runtime statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub jobs_total: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub jobs_cancelled: usize,
    /// Tasks that panicked; their job is unknown and reports no progress.
    pub jobs_panicked: usize,
    pub peak_in_flight: usize,
}

/// Result of a batch that was not aborted.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub batch_id: BatchId,
    /// One entry per job, in submission order.
    pub outcomes: Vec<JobOutcome<T>>,
    pub stats: BatchStats,
}

impl<T> BatchReport<T> {
    /// Successful values in submission order (failed jobs are skipped).
    pub fn values(&self) -> Vec<&T> {
        self.outcomes.iter().filter_map(|o| o.outcome.value()).collect()
    }

    pub fn into_values(self) -> Vec<T> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o.outcome {
                Outcome::Succeeded(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.outcome.is_success())
    }
}

/// Count of job tasks currently holding an admission slot.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest value ever observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An admission slot. Dropping it releases the permit, on every exit path
/// of the task that owns it (return, cancellation, panic).
struct Slot {
    _permit: OwnedSemaphorePermit,
    gauge: Arc<InFlightGauge>,
}

impl Slot {
    fn new(permit: OwnedSemaphorePermit, gauge: Arc<InFlightGauge>) -> Self {
        gauge.enter();
        Self {
            _permit: permit,
            gauge,
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.gauge.leave();
    }
}

/// What a job task hands back to the scheduler.
struct JobRun<T> {
    index: usize,
    job_id: JobId,
    result: Result<T, JobError>,
}

/// Admits jobs in submission order, at most `max_concurrency` at a time.
///
/// The window slides: as soon as any job reaches a terminal state the next
/// one is admitted. Completions, progress and batch-level events are handled
/// by the scheduler loop alone.
pub struct Scheduler<X, B> {
    executor: Arc<X>,
    bus: B,
    config: BatchConfig,
    gauge: Arc<InFlightGauge>,
}

impl<X, B> Scheduler<X, B>
where
    X: JobExecutor,
    B: EventBus<EventEnvelope<JobEvent>> + Clone + 'static,
{
    /// Build a scheduler, rejecting invalid policies up front.
    pub fn new(executor: X, bus: B, config: BatchConfig) -> Result<Self, EngineError> {
        Self::with_shared_executor(Arc::new(executor), bus, config)
    }

    pub fn with_shared_executor(
        executor: Arc<X>,
        bus: B,
        config: BatchConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            executor,
            bus,
            config,
            gauge: Arc::new(InFlightGauge::default()),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Jobs currently holding a slot, across all batches of this scheduler.
    pub fn in_flight(&self) -> usize {
        self.gauge.current()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.gauge.peak()
    }

    /// Run a batch to completion.
    ///
    /// Job ids must be unique within a batch; a repeated id is rejected
    /// before anything is admitted or published.
    ///
    /// Under `FailFast` the first exhausted job aborts the batch: nothing new
    /// is admitted, running jobs are cancelled and drained, `BatchAborted` is
    /// published last and its error is returned. Under `CollectAll` every job
    /// runs to its terminal state and the report lists each outcome.
    pub async fn run_batch(
        &self,
        jobs: Vec<JobId>,
    ) -> Result<BatchReport<X::Output>, EngineError> {
        self.config.validate()?;
        reject_duplicates(&jobs)?;

        let batch_id = BatchId::new();
        let events = EventEmitter::new(self.bus.clone(), batch_id);
        let total = jobs.len();
        let max_concurrency = self.config.max_concurrency;
        let fail_fast = self.config.failure_mode == FailureMode::FailFast;

        info!(%batch_id, total, max_concurrency, mode = ?self.config.failure_mode, "batch started");
        events.emit(JobEvent::BatchStarted {
            total,
            max_concurrency,
        });

        let guard = TimeoutGuard::new(self.config.timeout, events.clone());
        let controller = Arc::new(RetryController::new(
            self.config.retry.clone(),
            guard,
            events.clone(),
        ));

        let gate = Arc::new(Semaphore::new(max_concurrency));
        let cancel = CancellationToken::new();
        let mut tasks: JoinSet<JobRun<X::Output>> = JoinSet::new();
        let mut ledger = BatchLedger::new(total, events.clone());

        let mut queue = jobs.into_iter().enumerate().peekable();
        let mut admitting = true;
        let mut in_flight = 0usize;

        loop {
            if admitting && ledger.abort.is_none() && queue.peek().is_some() {
                tokio::select! {
                    biased;
                    Some(joined) = tasks.join_next() => {
                        in_flight -= 1;
                        ledger.settle(joined, fail_fast, &cancel);
                    }
                    permit = Arc::clone(&gate).acquire_owned() => {
                        let Ok(permit) = permit else {
                            // The gate is never closed while the batch runs.
                            admitting = false;
                            continue;
                        };
                        // A failing job cancels the batch before it frees its slot.
                        if cancel.is_cancelled() {
                            admitting = false;
                            continue;
                        }
                        let Some((index, job_id)) = queue.next() else {
                            continue;
                        };

                        let slot = Slot::new(permit, Arc::clone(&self.gauge));
                        in_flight += 1;
                        ledger.stats.peak_in_flight = ledger.stats.peak_in_flight.max(in_flight);
                        debug!(%batch_id, %job_id, index, in_flight, "job admitted");

                        let controller = Arc::clone(&controller);
                        let executor = Arc::clone(&self.executor);
                        let cancel = cancel.clone();
                        tasks.spawn(async move {
                            let _slot = slot;
                            let result = controller
                                .execute_with_retry(&job_id, executor.as_ref(), &cancel)
                                .await;
                            if fail_fast && matches!(result, Err(JobError::Exhausted(_))) {
                                cancel.cancel();
                            }
                            JobRun { index, job_id, result }
                        });
                    }
                }
            } else {
                match tasks.join_next().await {
                    Some(joined) => {
                        in_flight -= 1;
                        ledger.settle(joined, fail_fast, &cancel);
                    }
                    None => break,
                }
            }
        }

        let not_admitted = queue.count();
        if let Some(abort) = ledger.abort.take() {
            if not_admitted > 0 {
                info!(%batch_id, not_admitted, "jobs left unadmitted after abort");
            }
            let stats = ledger.stats;
            let settled = stats.jobs_succeeded + stats.jobs_failed + stats.jobs_cancelled;
            debug!(
                %batch_id,
                settled,
                panicked = stats.jobs_panicked,
                unaccounted = total.saturating_sub(settled),
                "batch accounting at abort"
            );
            events.emit(JobEvent::BatchAborted {
                job_id: abort.job_id.clone(),
                error: abort.error.to_string(),
            });
            return Err(abort.error);
        }

        let stats = ledger.stats;
        info!(
            %batch_id,
            succeeded = stats.jobs_succeeded,
            failed = stats.jobs_failed,
            peak_in_flight = stats.peak_in_flight,
            "batch completed"
        );
        events.emit(JobEvent::BatchCompleted {
            succeeded: stats.jobs_succeeded,
            failed: stats.jobs_failed,
        });

        Ok(BatchReport {
            batch_id,
            outcomes: ledger.outcomes.into_iter().flatten().collect(),
            stats,
        })
    }
}

fn reject_duplicates(jobs: &[JobId]) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::with_capacity(jobs.len());
    match jobs.iter().find(|job_id| !seen.insert(*job_id)) {
        Some(job_id) => Err(ConfigurationError::DuplicateJobId(job_id.clone())),
        None => Ok(()),
    }
}

/// The first error that aborted the batch.
struct Abort {
    job_id: JobId,
    error: EngineError,
}

/// Single-writer bookkeeping for one batch: outcomes, stats, progress.
struct BatchLedger<T, B> {
    outcomes: Vec<Option<JobOutcome<T>>>,
    stats: BatchStats,
    progress: ProgressTracker,
    abort: Option<Abort>,
    events: EventEmitter<B>,
}

impl<T, B> BatchLedger<T, B>
where
    B: EventBus<EventEnvelope<JobEvent>>,
{
    fn new(total: usize, events: EventEmitter<B>) -> Self {
        Self {
            outcomes: (0..total).map(|_| None).collect(),
            stats: BatchStats {
                jobs_total: total,
                ..BatchStats::default()
            },
            progress: ProgressTracker::new(total),
            abort: None,
            events,
        }
    }

    /// Record a finished task. Every terminal job accounts its progress
    /// share exactly once, whatever its outcome.
    fn settle(
        &mut self,
        joined: Result<JobRun<T>, JoinError>,
        fail_fast: bool,
        cancel: &CancellationToken,
    ) {
        let run = match joined {
            Ok(run) => run,
            Err(e) => {
                warn!(error = %e, "job task panicked");
                self.stats.jobs_panicked += 1;
                cancel.cancel();
                if self.abort.is_none() {
                    self.abort = Some(Abort {
                        job_id: JobId::from("<unknown>"),
                        error: EngineError::TaskPanicked(e.to_string()),
                    });
                }
                return;
            }
        };

        let outcome = match run.result {
            Ok(value) => {
                self.stats.jobs_succeeded += 1;
                Outcome::Succeeded(value)
            }
            Err(JobError::Exhausted(exhausted)) => {
                self.stats.jobs_failed += 1;
                if fail_fast && self.abort.is_none() {
                    cancel.cancel();
                    self.abort = Some(Abort {
                        job_id: run.job_id.clone(),
                        error: EngineError::RetriesExhausted(exhausted.clone()),
                    });
                }
                Outcome::Failed(exhausted)
            }
            Err(JobError::Cancelled { .. }) => {
                self.stats.jobs_cancelled += 1;
                self.events.emit(JobEvent::JobCancelled {
                    job_id: run.job_id.clone(),
                });
                Outcome::Cancelled
            }
        };

        if let Some(step) = self.progress.complete_one() {
            self.events.emit(JobEvent::Progress {
                job_id: run.job_id.clone(),
                percent_delta: step.percent_delta,
                cumulative: step.cumulative,
            });
        }

        if let Some(entry) = self.outcomes.get_mut(run.index) {
            *entry = Some(JobOutcome {
                job_id: run.job_id,
                outcome,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use batchrun_core::RetryPolicy;
    use batchrun_events::InMemoryEventBus;
    use tokio::time::sleep;

    use crate::error::NetworkError;
    use crate::executor::FnExecutor;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JobEvent>>>;

    fn ids(n: usize) -> Vec<JobId> {
        (0..n).map(|i| JobId::from(format!("file{i}"))).collect()
    }

    fn quick() -> impl JobExecutor<Output = String> {
        FnExecutor::new(|job: JobId| async move {
            sleep(Duration::from_millis(100)).await;
            Ok::<_, NetworkError>(format!("Data:{job}"))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_succeeds_without_starting_tasks() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe();
        let scheduler = Scheduler::new(quick(), bus, BatchConfig::default()).unwrap();

        let report = scheduler.run_batch(Vec::new()).await.unwrap();

        assert!(report.outcomes.is_empty());
        assert_eq!(scheduler.peak_in_flight(), 0);
        let kinds: Vec<_> = events
            .drain()
            .into_iter()
            .map(|e| batchrun_events::Event::event_type(e.payload()))
            .collect();
        assert_eq!(kinds, ["batch.started", "batch.completed"]);
    }

    #[test]
    fn zero_concurrency_is_a_configuration_error() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let config = BatchConfig::default().with_max_concurrency(0);

        let err = Scheduler::new(quick(), bus, config).err().unwrap();

        assert!(matches!(
            err,
            EngineError::Configuration(ConfigurationError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn concurrency_limit_matches_the_semaphore() {
        assert_eq!(batchrun_core::MAX_CONCURRENCY, Semaphore::MAX_PERMITS);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_job_aborts_and_is_counted() {
        let executor = FnExecutor::new(|job: JobId| async move {
            sleep(Duration::from_millis(10)).await;
            if job.as_str() == "file1" {
                panic!("loader blew up");
            }
            Ok::<_, NetworkError>(())
        });
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe();
        let scheduler = Scheduler::new(executor, bus, BatchConfig::default()).unwrap();

        let err = scheduler.run_batch(ids(3)).await.unwrap_err();

        assert!(matches!(err, EngineError::TaskPanicked(_)));
        assert_eq!(scheduler.in_flight(), 0);
        let last = events.drain().pop().map(|e| e.into_payload());
        assert!(matches!(
            last,
            Some(JobEvent::BatchAborted { ref job_id, .. }) if job_id.as_str() == "<unknown>"
        ));
    }

    #[tokio::test]
    async fn panicked_tasks_are_tallied_by_the_ledger() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let mut ledger: BatchLedger<(), Bus> =
            BatchLedger::new(2, EventEmitter::new(bus, BatchId::new()));
        let cancel = CancellationToken::new();
        let explode = true;

        let joined = tokio::spawn(async move {
            if explode {
                panic!("loader blew up");
            }
            JobRun {
                index: 0,
                job_id: JobId::from("file0"),
                result: Ok(()),
            }
        })
        .await;
        ledger.settle(joined, true, &cancel);

        assert_eq!(ledger.stats.jobs_panicked, 1);
        assert_eq!(ledger.stats.jobs_succeeded + ledger.stats.jobs_failed, 0);
        assert!(cancel.is_cancelled());
        assert!(matches!(
            ledger.abort.as_ref().map(|a| &a.error),
            Some(EngineError::TaskPanicked(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_keep_submission_order() {
        // Later jobs finish first.
        let executor = FnExecutor::new(|job: JobId| async move {
            let n: u64 = job.as_str().trim_start_matches("file").parse().unwrap_or(0);
            sleep(Duration::from_millis(500 - n * 100)).await;
            Ok::<_, NetworkError>(n)
        });
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let scheduler = Scheduler::new(executor, bus, BatchConfig::default()).unwrap();

        let report = scheduler.run_batch(ids(5)).await.unwrap();

        assert_eq!(report.into_values(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_instead_of_waiting_for_a_cohort() {
        // file0 is slow; the others should keep flowing past it.
        let executor = FnExecutor::new(|job: JobId| async move {
            let ms = if job.as_str() == "file0" { 1000 } else { 100 };
            sleep(Duration::from_millis(ms)).await;
            Ok::<_, NetworkError>(tokio::time::Instant::now())
        });
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let config = BatchConfig::default().with_max_concurrency(2);
        let scheduler = Scheduler::new(executor, bus, config).unwrap();
        let started = tokio::time::Instant::now();

        let report = scheduler.run_batch(ids(5)).await.unwrap();

        let done: Vec<_> = report.into_values().into_iter().map(|t| t - started).collect();
        assert_eq!(done[0], Duration::from_millis(1000));
        // file1..file4 run back to back in the second slot.
        assert_eq!(done[4], Duration::from_millis(400));
        assert_eq!(scheduler.peak_in_flight(), 2);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn collect_all_reports_failures_alongside_successes() {
        let executor = FnExecutor::new(|job: JobId| async move {
            sleep(Duration::from_millis(10)).await;
            if job.as_str() == "file1" {
                Err(NetworkError::new(job, "Network error loading file1"))
            } else {
                Ok(())
            }
        });
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let config = BatchConfig::default()
            .with_failure_mode(FailureMode::CollectAll)
            .with_retry_policy(RetryPolicy::exponential(1, Duration::from_millis(10)));
        let scheduler = Scheduler::new(executor, bus, config).unwrap();

        let report = scheduler.run_batch(ids(3)).await.unwrap();

        assert!(!report.all_succeeded());
        assert_eq!(report.stats.jobs_succeeded, 2);
        assert_eq!(report.stats.jobs_failed, 1);
        assert!(matches!(
            &report.outcomes[1].outcome,
            Outcome::Failed(RetriesExhaustedError { attempts: 2, .. })
        ));
    }
}
