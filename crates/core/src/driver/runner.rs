//! The driver entry point: one call, one run, one result.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{error, info};

use super::{
    AuditReporter, AwaitBarrier, BarrierPoint, BatchLauncher, DriverError, DriverResult,
    MergeCoordinator, MergeOutcome, MergeStep, RunContext, RunPhase, StatusConsolidator,
};
use crate::audit::AuditHandle;
use crate::catalog::WorkCatalog;
use crate::config::DriverConfig;
use crate::executor::JobExecutor;
use crate::metrics;
use crate::staging::{StagingArea, StagingBuffers};
use crate::warehouse::{default_merge_steps, SqliteWarehouse};

/// Orchestrates launch, barrier, consolidation, merge and audit for one run.
pub struct HarvestDriver {
    launcher: BatchLauncher,
    time_zone: Tz,
    catalog: Arc<dyn WorkCatalog>,
    executor: Arc<dyn JobExecutor>,
    staging: Arc<StagingArea>,
    coordinator: MergeCoordinator,
    audit: Option<AuditHandle>,
}

impl HarvestDriver {
    pub fn new(
        config: &DriverConfig,
        catalog: Arc<dyn WorkCatalog>,
        executor: Arc<dyn JobExecutor>,
        warehouse: Arc<SqliteWarehouse>,
    ) -> Result<Self, DriverError> {
        let time_zone = config
            .time_zone
            .parse::<Tz>()
            .map_err(|_| DriverError::InvalidTimeZone(config.time_zone.clone()))?;

        Ok(Self {
            launcher: BatchLauncher::new(config.batch_size),
            time_zone,
            catalog,
            executor,
            staging: Arc::new(StagingArea::new()),
            coordinator: MergeCoordinator::new(warehouse, default_merge_steps()),
            audit: None,
        })
    }

    /// Attach the audit sink that receives every finished run.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Replace the merge steps.
    pub fn with_merge_steps(mut self, steps: Vec<Box<dyn MergeStep>>) -> Self {
        self.coordinator = MergeCoordinator::new(self.coordinator.warehouse(), steps);
        self
    }

    pub fn staging(&self) -> &Arc<StagingArea> {
        &self.staging
    }

    /// Execute one full run. Never fails: problems are reported in the result.
    pub async fn run(&self) -> DriverResult {
        let mut ctx = RunContext::new(self.time_zone);
        info!(run_id = %ctx.run_id, time_zone = %self.time_zone, "Driver run started");

        let outcome = match self.staging.open(ctx.run_id) {
            Ok(buffers) => self.execute(&mut ctx, &buffers).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = outcome {
            error!(run_id = %ctx.run_id, phase = ?ctx.phase(), "Critical failure: {}", e);
            ctx.record_failure(format!("Critical failure during {:?}: {}", ctx.phase(), e));
            ctx.advance(RunPhase::CriticalFailure);
            ctx.note("Any open transaction was rolled back");

            let aborted = self.executor.abort_run(ctx.run_id);
            if aborted > 0 {
                ctx.note(format!("Abandoned {} unjoined job(s)", aborted));
            }
        }

        self.staging.discard(ctx.run_id);

        let result = AuditReporter::assemble(&ctx, Utc::now());
        metrics::RUNS.with_label_values(&[result.status.as_str()]).inc();
        metrics::RUN_DURATION.observe(result.total_run_duration_sec);
        info!(
            run_id = %result.run_id,
            status = %result.status,
            launched = result.total_jobs_launched,
            succeeded = result.total_jobs_succeeded,
            failed = result.total_jobs_failed,
            "Driver run finished"
        );

        if let Some(audit) = &self.audit {
            audit.emit(result.clone()).await;
        }
        result
    }

    async fn execute(
        &self,
        ctx: &mut RunContext,
        buffers: &StagingBuffers,
    ) -> Result<(), DriverError> {
        let items = self.catalog.list_active_work_items()?;
        ctx.counters.tables_found = items.len();
        ctx.note(format!("Found {} active table(s)", items.len()));

        ctx.advance(RunPhase::Launching);
        let started = Instant::now();
        let snapshot_date = ctx.started_at.with_timezone(&self.time_zone).date_naive();
        let summary = self
            .launcher
            .launch(&items, self.executor.as_ref(), buffers, snapshot_date, ctx)
            .await?;
        ctx.durations.launch = observe("launch", started);
        ctx.note(format!(
            "Launched {} job(s), {} submission failure(s), {} batch barrier(s)",
            summary.submitted, summary.submission_failures, summary.batch_barriers
        ));

        ctx.advance(RunPhase::Awaiting);
        if summary.in_flight > 0 {
            let started = Instant::now();
            AwaitBarrier::wait(self.executor.as_ref(), ctx, BarrierPoint::Final).await;
            ctx.durations.wait = observe("await", started);
            ctx.note(format!("Drained {} remaining job(s)", summary.in_flight));
        }

        ctx.advance(RunPhase::Consolidating);
        let staged = buffers.snapshot()?;
        StatusConsolidator::apply(&staged.statuses, ctx);

        if ctx.any_failure_observed {
            ctx.advance(RunPhase::Skipped);
            ctx.note("Failures observed, merge skipped; staged output discarded");
            ctx.advance(RunPhase::RolledBack);
            return Ok(());
        }

        ctx.advance(RunPhase::Merging);
        let started = Instant::now();
        let outcome = self.coordinator.commit(&staged, ctx)?;
        ctx.durations.merge = observe("merge", started);

        match outcome {
            MergeOutcome::Committed { .. } => {
                ctx.note("Merge committed");
                ctx.advance(RunPhase::Committed);
            }
            MergeOutcome::RolledBack { step, .. } => {
                ctx.note(format!("Merge rolled back at step {}", step));
                ctx.advance(RunPhase::RolledBack);
            }
        }
        Ok(())
    }
}

fn observe(phase: &str, started: Instant) -> f64 {
    let secs = started.elapsed().as_secs_f64();
    metrics::PHASE_DURATION
        .with_label_values(&[phase])
        .observe(secs);
    secs
}
