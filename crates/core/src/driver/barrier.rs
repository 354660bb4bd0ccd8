use tracing::{debug, warn};

use super::RunContext;
use crate::executor::JobExecutor;
use crate::metrics;

/// Where in the run a barrier was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierPoint {
    /// In-flight count reached the batch size.
    Batch,
    /// Drain after the launch loop.
    Final,
}

impl BarrierPoint {
    fn label(&self) -> &'static str {
        match self {
            BarrierPoint::Batch => "batch",
            BarrierPoint::Final => "final",
        }
    }
}

/// Join point over everything the run has in flight.
pub struct AwaitBarrier;

impl AwaitBarrier {
    /// Wait for the run's in-flight jobs. A failing wait is recorded on the
    /// context and the run carries on.
    pub async fn wait(executor: &dyn JobExecutor, ctx: &mut RunContext, point: BarrierPoint) {
        ctx.counters.barrier_waits += 1;
        metrics::BARRIER_WAITS
            .with_label_values(&[point.label()])
            .inc();

        match executor.await_all(ctx.run_id).await {
            Ok(report) => {
                debug!(
                    run_id = %ctx.run_id,
                    point = point.label(),
                    joined = report.joined,
                    "Barrier released"
                );
            }
            Err(e) => {
                warn!(run_id = %ctx.run_id, point = point.label(), "Barrier failed: {}", e);
                metrics::BARRIER_FAILURES.inc();
                ctx.record_failure(format!("Barrier ({}) failed: {}", point.label(), e));
            }
        }
    }
}
