//! Criterion benchmarks for trace_fanout_logger

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use trace_fanout_logger::prelude::*;

/// Accepts everything and discards it, so benchmarks measure the core only
struct NullSink;

impl Appender for NullSink {
    fn append(&self, payload: &SinkPayload) -> Result<()> {
        black_box(payload);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

struct FixedApm;

impl ApmAgent for FixedApm {
    fn current_transaction(&self) -> Option<Correlation> {
        Some(Correlation::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7"))
    }

    fn capture_error(&self, _error: &ErrorEvent) {}
}

fn sample_event() -> MessageEvent {
    MessageEvent::new(LogLevel::Info, "Request processed")
        .with_field("route", "/api/orders")
        .with_field("status", 200)
        .with_field("durationMs", 12.5)
}

// ============================================================================
// Normalization Benchmarks
// ============================================================================

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");
    group.throughput(Throughput::Elements(1));

    group.bench_function("message_with_fields", |b| {
        b.iter(|| {
            NormalizedRecord::from_event(black_box(sample_event()).into(), Correlation::none())
        });
    });

    group.bench_function("error_event", |b| {
        b.iter(|| {
            NormalizedRecord::from_event(
                ErrorEvent::new("TimeoutError", "upstream timed out", "TimeoutError: ...").into(),
                Correlation::new("trace", "tx"),
            )
        });
    });

    group.finish();
}

// ============================================================================
// Format Pipeline Benchmarks
// ============================================================================

fn bench_pipelines(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipelines");
    group.throughput(Throughput::Elements(1));

    let record = NormalizedRecord::from_event(sample_event().into(), Correlation::new("t", "x"));

    for pipeline in [
        FormatPipeline::cli(),
        FormatPipeline::cli().with_colors(false),
        FormatPipeline::file(),
        FormatPipeline::json(),
    ] {
        let label = match &pipeline {
            FormatPipeline::Cli { colors: true, .. } => "cli_colored",
            FormatPipeline::Cli { .. } => "cli_plain",
            other => other.name(),
        };
        group.bench_function(label, |b| {
            b.iter(|| pipeline.format(black_box(&record)));
        });
    }

    group.finish();
}

// ============================================================================
// Fan-out Benchmarks
// ============================================================================

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");
    group.throughput(Throughput::Elements(1));

    for sinks in [1usize, 2, 4] {
        let mut builder = Logger::builder().apm(Arc::new(FixedApm));
        for i in 0..sinks {
            let pipeline = if i % 2 == 0 {
                FormatPipeline::file()
            } else {
                FormatPipeline::json()
            };
            builder = builder.sink(NullSink, LogLevel::Silly, pipeline);
        }
        let logger = builder.build();

        group.bench_function(format!("{}_sinks", sinks), |b| {
            b.iter(|| logger.log(black_box(sample_event())));
        });
    }

    group.finish();
}

fn bench_level_filtering(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_filtering");
    group.throughput(Throughput::Elements(1));

    let logger = Logger::builder()
        .sink(NullSink, LogLevel::Warn, FormatPipeline::json())
        .build();

    group.bench_function("filtered_out", |b| {
        b.iter(|| logger.debug(black_box("Filtered debug message")));
    });

    group.bench_function("accepted", |b| {
        b.iter(|| logger.warn(black_box("Accepted warning")));
    });

    group.finish();
}

fn bench_concurrent_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_logging");

    let logger = Arc::new(
        Logger::builder()
            .sink(NullSink, LogLevel::Silly, FormatPipeline::file())
            .build(),
    );

    for threads in [2usize, 4] {
        group.throughput(Throughput::Elements((threads * 100) as u64));
        group.bench_function(format!("{}_threads", threads), |b| {
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let logger = Arc::clone(&logger);
                        std::thread::spawn(move || {
                            for _ in 0..100 {
                                logger.info("concurrent message");
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_normalization,
    bench_pipelines,
    bench_fanout,
    bench_level_filtering,
    bench_concurrent_logging
);

criterion_main!(benches);
