use chrono::NaiveDate;
use tracing::{info, warn};

use super::{AwaitBarrier, BarrierPoint, DriverError, RunContext};
use crate::catalog::WorkItem;
use crate::executor::{CollectionWindow, JobExecutor, JobRequest};
use crate::job::JobStatus;
use crate::metrics;
use crate::staging::StagingBuffers;

/// What the launch loop left behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchSummary {
    pub submitted: usize,
    pub submission_failures: usize,
    pub batch_barriers: usize,
    /// Jobs submitted since the last barrier; the final drain waits on these.
    pub in_flight: usize,
}

/// Submits one job per tracked capability and waits every `batch_size` jobs.
#[derive(Debug, Clone, Copy)]
pub struct BatchLauncher {
    batch_size: i64,
}

impl BatchLauncher {
    /// `batch_size <= 0` disables mid-run barriers.
    pub fn new(batch_size: i64) -> Self {
        Self { batch_size }
    }

    pub async fn launch(
        &self,
        items: &[WorkItem],
        executor: &dyn JobExecutor,
        buffers: &StagingBuffers,
        snapshot_date: NaiveDate,
        ctx: &mut RunContext,
    ) -> Result<LaunchSummary, DriverError> {
        let mut summary = LaunchSummary::default();

        for item in items {
            for kind in item.job_kinds() {
                let request = JobRequest {
                    run_id: ctx.run_id,
                    item: item.clone(),
                    kind,
                    window: CollectionWindow {
                        days: item.window_for(kind),
                        snapshot_date,
                    },
                    buffers: buffers.clone(),
                };

                match executor.submit(request) {
                    Ok(_) => {
                        buffers.record_status(&item.item_name, kind, JobStatus::Submitted, None)?;
                        ctx.counters.jobs_launched += 1;
                        summary.submitted += 1;
                        summary.in_flight += 1;
                        metrics::JOBS_LAUNCHED.with_label_values(&[kind.as_str()]).inc();

                        if self.batch_size > 0 && summary.in_flight as i64 >= self.batch_size {
                            AwaitBarrier::wait(executor, ctx, BarrierPoint::Batch).await;
                            summary.batch_barriers += 1;
                            summary.in_flight = 0;
                        }
                    }
                    Err(e) => {
                        warn!(item = %item.item_name, kind = %kind, "Submission failed: {}", e);
                        buffers.record_status(
                            &item.item_name,
                            kind,
                            JobStatus::FailedSubmission,
                            Some(e.to_string()),
                        )?;
                        ctx.counters.submission_failures += 1;
                        summary.submission_failures += 1;
                        metrics::SUBMISSION_FAILURES.inc();
                        ctx.record_failure(format!(
                            "Submission of {} for {} failed: {}",
                            kind, item.item_name, e
                        ));
                    }
                }
            }
        }

        info!(
            run_id = %ctx.run_id,
            submitted = summary.submitted,
            failed = summary.submission_failures,
            barriers = summary.batch_barriers,
            "Launch loop finished"
        );
        Ok(summary)
    }
}
