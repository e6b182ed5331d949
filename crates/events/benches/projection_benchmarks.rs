use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use batchrun_core::{BatchId, JobId};
use batchrun_events::{
    EventBus, EventEnvelope, InMemoryEventBus, JobEvent, LogProjection, ProgressProjection,
    ProgressTracker, ProjectionRunner,
};

/// A plausible batch stream: every job starts, half of them retry once,
/// then each one succeeds and reports progress.
fn batch_stream(jobs: usize) -> Vec<EventEnvelope<JobEvent>> {
    let batch = BatchId::new();
    let mut tracker = ProgressTracker::new(jobs);
    let mut seq = 0u64;
    let mut out = Vec::with_capacity(jobs * 5);
    let mut push = |event: JobEvent, out: &mut Vec<EventEnvelope<JobEvent>>| {
        seq += 1;
        out.push(EventEnvelope::new(batch, seq, event));
    };

    push(
        JobEvent::BatchStarted {
            total: jobs,
            max_concurrency: 3,
        },
        &mut out,
    );
    for i in 0..jobs {
        let job_id = JobId::from(format!("file{i}"));
        push(
            JobEvent::JobStarted {
                job_id: job_id.clone(),
                attempt: 1,
            },
            &mut out,
        );
        if i % 2 == 0 {
            push(
                JobEvent::JobRetrying {
                    job_id: job_id.clone(),
                    retry: 1,
                    delay: std::time::Duration::from_millis(100),
                    error: format!("Network error loading {job_id}"),
                },
                &mut out,
            );
        }
        push(
            JobEvent::JobSucceeded {
                job_id: job_id.clone(),
                attempts: 1,
            },
            &mut out,
        );
        if let Some(step) = tracker.complete_one() {
            push(
                JobEvent::Progress {
                    job_id,
                    percent_delta: step.percent_delta,
                    cumulative: step.cumulative,
                },
                &mut out,
            );
        }
    }
    push(
        JobEvent::BatchCompleted {
            succeeded: jobs,
            failed: 0,
        },
        &mut out,
    );
    out
}

fn bench_projection_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild");

    for jobs in [10usize, 100, 1000].iter() {
        let stream = batch_stream(*jobs);
        group.throughput(Throughput::Elements(stream.len() as u64));

        group.bench_with_input(BenchmarkId::new("progress", jobs), &stream, |b, stream| {
            b.iter(|| {
                let (view, _) =
                    ProjectionRunner::rebuild_from_scratch(ProgressProjection::new, stream)
                        .unwrap();
                black_box(view.percent())
            });
        });

        group.bench_with_input(BenchmarkId::new("log", jobs), &stream, |b, stream| {
            b.iter(|| {
                let (log, _) =
                    ProjectionRunner::rebuild_from_scratch(LogProjection::new, stream).unwrap();
                black_box(log.lines().len())
            });
        });
    }

    group.finish();
}

fn bench_bus_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus_fan_out");
    let stream = batch_stream(100);

    for subscribers in [1usize, 4, 16].iter() {
        group.bench_with_input(
            BenchmarkId::new("publish_batch", subscribers),
            subscribers,
            |b, &subscribers| {
                b.iter(|| {
                    let bus = InMemoryEventBus::new();
                    let subs: Vec<_> = (0..subscribers).map(|_| bus.subscribe()).collect();
                    for envelope in &stream {
                        bus.publish(envelope.clone()).unwrap();
                    }
                    black_box(subs.iter().map(|s| s.drain().len()).sum::<usize>())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_projection_rebuild, bench_bus_fan_out);
criterion_main!(benches);
