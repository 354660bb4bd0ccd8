//! Semaphore-bounded task pool backing the default executor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{
    BarrierError, BarrierReport, CollectError, Collector, JobExecutor, JobHandle, JobRequest,
    SubmissionError,
};
use crate::job::{JobKind, JobStatus};
use crate::metrics;

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    total_submitted: AtomicU64,
    total_succeeded: AtomicU64,
    total_failed: AtomicU64,
}

/// Holds one slot of `PoolStats::active` until dropped, including on unwind.
struct ActiveGuard(Arc<PoolStats>);

impl ActiveGuard {
    fn enter(stats: &Arc<PoolStats>) -> Self {
        stats.active.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(stats))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Point-in-time counters for the pool.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutorStats {
    pub active_jobs: u64,
    pub max_concurrent: usize,
    pub total_submitted: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
}

/// Spawns each job as a tokio task; at most `max_concurrent` collect at once.
///
/// Tasks are grouped per run so `await_all` only joins the caller's jobs.
pub struct TaskExecutor {
    collector: Arc<dyn Collector>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    runs: Mutex<HashMap<Uuid, JoinSet<()>>>,
    closed: AtomicBool,
    stats: Arc<PoolStats>,
}

impl TaskExecutor {
    pub fn new(collector: Arc<dyn Collector>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            collector,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            runs: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            active_jobs: self.stats.active.load(Ordering::Relaxed),
            max_concurrent: self.max_concurrent,
            total_submitted: self.stats.total_submitted.load(Ordering::Relaxed),
            total_succeeded: self.stats.total_succeeded.load(Ordering::Relaxed),
            total_failed: self.stats.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Refuse new submissions and abort everything still running.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.semaphore.close();
        match self.runs.lock() {
            Ok(mut runs) => runs.values_mut().for_each(|set| set.abort_all()),
            Err(poisoned) => poisoned
                .into_inner()
                .values_mut()
                .for_each(|set| set.abort_all()),
        }
    }

    fn validate(&self, request: &JobRequest) -> Result<(), SubmissionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SubmissionError::Closed);
        }
        if request.buffers.run_id() != request.run_id {
            return Err(SubmissionError::RunMismatch {
                job: request.run_id,
                buffers: request.buffers.run_id(),
            });
        }
        if request.window.days <= 0 {
            return Err(SubmissionError::InvalidWindow {
                item: request.item.item_name.clone(),
                kind: request.kind,
                days: request.window.days,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl JobExecutor for TaskExecutor {
    fn submit(&self, request: JobRequest) -> Result<JobHandle, SubmissionError> {
        self.validate(&request)?;

        let handle = JobHandle {
            run_id: request.run_id,
            item_name: request.item.item_name.clone(),
            kind: request.kind,
            submitted_at: Utc::now(),
        };

        let mut runs = self
            .runs
            .lock()
            .map_err(|_| SubmissionError::Rejected("executor state poisoned".to_string()))?;

        self.stats.total_submitted.fetch_add(1, Ordering::Relaxed);
        runs.entry(request.run_id).or_default().spawn(run_job(
            Arc::clone(&self.collector),
            Arc::clone(&self.semaphore),
            Arc::clone(&self.stats),
            request,
        ));

        debug!(
            run_id = %handle.run_id,
            item = %handle.item_name,
            kind = %handle.kind,
            "Job submitted"
        );
        Ok(handle)
    }

    async fn await_all(&self, run_id: Uuid) -> Result<BarrierReport, BarrierError> {
        let mut set = {
            let mut runs = self
                .runs
                .lock()
                .map_err(|_| BarrierError::Wait("executor state poisoned".to_string()))?;
            runs.remove(&run_id).unwrap_or_default()
        };

        let mut joined = 0;
        let mut lost = 0;
        let mut first_loss = None;
        while let Some(result) = set.join_next().await {
            joined += 1;
            if let Err(e) = result {
                lost += 1;
                error!(run_id = %run_id, "Job task did not complete: {}", e);
                first_loss.get_or_insert_with(|| e.to_string());
            }
        }

        match first_loss {
            Some(first) => Err(BarrierError::JobsLost { lost, first }),
            None => Ok(BarrierReport { joined }),
        }
    }
    fn abort_run(&self, run_id: Uuid) -> usize {
        let set = match self.runs.lock() {
            Ok(mut runs) => runs.remove(&run_id),
            Err(poisoned) => poisoned.into_inner().remove(&run_id),
        };
        match set {
            Some(mut set) => {
                let count = set.len();
                set.abort_all();
                if count > 0 {
                    warn!(run_id = %run_id, jobs = count, "Aborted run jobs");
                }
                count
            }
            None => 0,
        }
    }
}

async fn run_job(
    collector: Arc<dyn Collector>,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
    request: JobRequest,
) {
    let JobRequest {
        item,
        kind,
        window,
        buffers,
        ..
    } = request;

    let outcome = match semaphore.acquire_owned().await {
        Ok(_permit) => {
            let _active = ActiveGuard::enter(&stats);
            match kind {
                JobKind::RowHistory => match collector.collect_row_history(&item, &window).await {
                    Ok(rows) => buffers
                        .append_row_history(&item.item_name, rows)
                        .map_err(|e| CollectError::Execution(e.to_string())),
                    Err(e) => Err(e),
                },
                JobKind::Metadata => match collector.collect_metadata(&item, &window).await {
                    Ok(row) if row.item_name != item.item_name => Err(CollectError::Execution(
                        format!("metadata returned for {}", row.item_name),
                    )),
                    Ok(row) => buffers
                        .put_metadata(row)
                        .map_err(|e| CollectError::Execution(e.to_string())),
                    Err(e) => Err(e),
                },
            }
        }
        Err(_) => Err(CollectError::Execution(
            "executor closed before job started".to_string(),
        )),
    };

    let (status, message) = match outcome {
        Ok(()) => {
            stats.total_succeeded.fetch_add(1, Ordering::Relaxed);
            (JobStatus::Success, None)
        }
        Err(e) => {
            stats.total_failed.fetch_add(1, Ordering::Relaxed);
            warn!(item = %item.item_name, kind = %kind, "Job failed: {}", e);
            (e.status(), Some(e.to_string()))
        }
    };
    metrics::JOBS_FINISHED
        .with_label_values(&[kind.as_str(), status.as_str()])
        .inc();

    if let Err(e) = buffers.record_status(&item.item_name, kind, status, message) {
        error!(item = %item.item_name, kind = %kind, "Failed to record job status: {}", e);
    }
}
