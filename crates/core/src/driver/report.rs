use chrono::{DateTime, SecondsFormat, Utc};

use super::{DriverResult, DriverStatus, RunContext, RunPhase};

/// Turns a finished run context into the caller-facing result.
pub struct AuditReporter;

impl AuditReporter {
    pub fn status_of(ctx: &RunContext) -> DriverStatus {
        match ctx.phase() {
            RunPhase::CriticalFailure => DriverStatus::CriticalFailure,
            RunPhase::Committed if !ctx.any_failure_observed => DriverStatus::Success,
            _ => DriverStatus::FailedOverall,
        }
    }

    pub fn assemble(ctx: &RunContext, ended_at: DateTime<Utc>) -> DriverResult {
        let status = Self::status_of(ctx);

        // A critical failure discards whatever the jobs reported.
        let (succeeded, failed) = match status {
            DriverStatus::CriticalFailure => (0, ctx.counters.jobs_launched),
            _ => (ctx.counters.jobs_succeeded, ctx.counters.jobs_failed),
        };

        let elapsed = (ended_at - ctx.started_at).num_milliseconds().max(0) as f64 / 1000.0;

        DriverResult {
            status,
            message: ctx.log_lines().join("\n"),
            run_id: ctx.run_id,
            start_time: render(ctx.started_at, ctx),
            end_time: render(ended_at, ctx),
            time_zone: ctx.time_zone.to_string(),
            total_tables_found: ctx.counters.tables_found,
            total_jobs_launched: ctx.counters.jobs_launched,
            total_jobs_succeeded: succeeded,
            total_jobs_failed: failed,
            item_audit_details: ctx.item_audits.clone(),
            phase_durations_sec: ctx.durations,
            total_run_duration_sec: elapsed,
        }
    }
}

fn render(at: DateTime<Utc>, ctx: &RunContext) -> String {
    at.with_timezone(&ctx.time_zone)
        .to_rfc3339_opts(SecondsFormat::Millis, false)
}
