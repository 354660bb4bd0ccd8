//! Executor wrapper that injects submission and barrier failures.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::executor::{
    BarrierError, BarrierReport, JobExecutor, JobHandle, JobRequest, SubmissionError,
};
use crate::job::JobKind;

/// Wraps a real executor and counts what the driver asks of it.
///
/// Scripted submission rejections never reach the inner executor. A
/// scripted barrier failure still joins the inner jobs first, then errors.
pub struct ScriptedExecutor {
    inner: Arc<dyn JobExecutor>,
    rejected: Mutex<HashSet<(String, JobKind)>>,
    failing_barriers: Mutex<HashSet<usize>>,
    submissions: AtomicUsize,
    barrier_calls: AtomicUsize,
    barrier_joined: Mutex<Vec<usize>>,
    aborted_runs: Mutex<Vec<Uuid>>,
}

impl ScriptedExecutor {
    pub fn new(inner: Arc<dyn JobExecutor>) -> Self {
        Self {
            inner,
            rejected: Mutex::new(HashSet::new()),
            failing_barriers: Mutex::new(HashSet::new()),
            submissions: AtomicUsize::new(0),
            barrier_calls: AtomicUsize::new(0),
            barrier_joined: Mutex::new(Vec::new()),
            aborted_runs: Mutex::new(Vec::new()),
        }
    }

    /// Reject the submission for (item, kind).
    pub fn reject(&self, item_name: &str, kind: JobKind) {
        self.rejected
            .lock()
            .unwrap()
            .insert((item_name.to_string(), kind));
    }

    /// Make the `n`-th barrier call (1-based) fail.
    pub fn fail_barrier(&self, n: usize) {
        self.failing_barriers.lock().unwrap().insert(n);
    }

    /// Successful submissions forwarded to the inner executor.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn barrier_calls(&self) -> usize {
        self.barrier_calls.load(Ordering::SeqCst)
    }

    /// Jobs joined by each successful barrier, in call order.
    pub fn barrier_sizes(&self) -> Vec<usize> {
        self.barrier_joined.lock().unwrap().clone()
    }

    /// Runs the driver abandoned, in call order.
    pub fn aborted_runs(&self) -> Vec<Uuid> {
        self.aborted_runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobExecutor for ScriptedExecutor {
    fn submit(&self, request: JobRequest) -> Result<JobHandle, SubmissionError> {
        let key = (request.item.item_name.clone(), request.kind);
        if self.rejected.lock().unwrap().contains(&key) {
            return Err(SubmissionError::Rejected(format!(
                "scripted rejection for {} {}",
                key.0, key.1
            )));
        }
        let handle = self.inner.submit(request)?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn await_all(&self, run_id: Uuid) -> Result<BarrierReport, BarrierError> {
        let call = self.barrier_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let report = self.inner.await_all(run_id).await?;
        self.barrier_joined.lock().unwrap().push(report.joined);

        if self.failing_barriers.lock().unwrap().contains(&call) {
            return Err(BarrierError::Wait(format!("scripted failure of barrier {}", call)));
        }
        Ok(report)
    }

    fn abort_run(&self, run_id: Uuid) -> usize {
        self.aborted_runs.lock().unwrap().push(run_id);
        self.inner.abort_run(run_id)
    }
}
