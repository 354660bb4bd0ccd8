//! Job execution.
//!
//! The launcher hands each job to a [`JobExecutor`] and later joins the
//! in-flight set through [`JobExecutor::await_all`]. What a job actually
//! collects is delegated to a [`Collector`].

mod sqlite_probe;
mod task;
mod types;
mod unconfigured;

pub use sqlite_probe::SqliteProbeCollector;
pub use task::{ExecutorStats, TaskExecutor};
pub use types::*;
pub use unconfigured::UnconfiguredCollector;

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::WorkItem;
use crate::staging::{MetadataRow, RowHistoryRow};

/// Runs submitted jobs and reports terminal statuses through the staging buffers.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Start one job. An error means the job never entered flight.
    fn submit(&self, request: JobRequest) -> Result<JobHandle, SubmissionError>;

    /// Block until every job of `run_id` submitted so far is terminal.
    async fn await_all(&self, run_id: Uuid) -> Result<BarrierReport, BarrierError>;

    /// Abandon every job of `run_id` still held by the executor. Returns how
    /// many were dropped.
    fn abort_run(&self, run_id: Uuid) -> usize;
}

/// Collection logic for each job kind.
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect_row_history(
        &self,
        item: &WorkItem,
        window: &CollectionWindow,
    ) -> Result<Vec<RowHistoryRow>, CollectError>;

    async fn collect_metadata(
        &self,
        item: &WorkItem,
        window: &CollectionWindow,
    ) -> Result<MetadataRow, CollectError>;
}
