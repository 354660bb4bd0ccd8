//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Driver runs (outcomes, phase durations)
//! - Jobs (launches, submission failures, terminal statuses)
//! - Barriers and merge steps

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Runs
// =============================================================================

/// Driver runs by final status.
pub static RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_runs_total", "Total driver runs"),
        &["status"], // "SUCCESS", "FAILED_OVERALL", "CRITICAL_FAILURE"
    )
    .unwrap()
});

/// Wall-clock duration of a run.
pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("harvester_run_duration_seconds", "Duration of a driver run")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
    )
    .unwrap()
});

/// Duration of each run phase.
pub static PHASE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "harvester_phase_duration_seconds",
            "Duration of launch, await and merge phases",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["phase"],
    )
    .unwrap()
});

// =============================================================================
// Jobs
// =============================================================================

/// Jobs that entered flight, by kind.
pub static JOBS_LAUNCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_jobs_launched_total", "Jobs submitted successfully"),
        &["kind"],
    )
    .unwrap()
});

/// Jobs rejected at submission.
pub static SUBMISSION_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "harvester_submission_failures_total",
        "Jobs that failed to submit",
    )
    .unwrap()
});

/// Jobs that reached a terminal status inside the executor.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_jobs_finished_total", "Jobs finished by kind and status"),
        &["kind", "status"],
    )
    .unwrap()
});

// =============================================================================
// Barriers & merge
// =============================================================================

/// Barrier waits by point ("batch", "final").
pub static BARRIER_WAITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_barrier_waits_total", "Barrier waits"),
        &["point"],
    )
    .unwrap()
});

/// Barrier waits that errored.
pub static BARRIER_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("harvester_barrier_failures_total", "Barrier waits that failed").unwrap()
});

/// Rows written per merge step (counted before commit).
pub static MERGE_ROWS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_merge_rows_total", "Rows written by merge steps"),
        &["step"],
    )
    .unwrap()
});

/// Register all core metrics with a registry.
pub fn register_core_metrics(registry: &prometheus::Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(RUNS.clone()))?;
    registry.register(Box::new(RUN_DURATION.clone()))?;
    registry.register(Box::new(PHASE_DURATION.clone()))?;
    registry.register(Box::new(JOBS_LAUNCHED.clone()))?;
    registry.register(Box::new(SUBMISSION_FAILURES.clone()))?;
    registry.register(Box::new(JOBS_FINISHED.clone()))?;
    registry.register(Box::new(BARRIER_WAITS.clone()))?;
    registry.register(Box::new(BARRIER_FAILURES.clone()))?;
    registry.register(Box::new(MERGE_ROWS.clone()))?;
    Ok(())
}
