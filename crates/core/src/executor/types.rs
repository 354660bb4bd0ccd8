use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::WorkItem;
use crate::job::{JobKind, JobStatus};
use crate::staging::StagingBuffers;

/// Window handed to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    pub days: i64,
    /// Run date in the driver's time zone.
    pub snapshot_date: NaiveDate,
}

/// Everything a job needs.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub run_id: Uuid,
    pub item: WorkItem,
    pub kind: JobKind,
    pub window: CollectionWindow,
    pub buffers: StagingBuffers,
}

/// Receipt for a job that entered flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub run_id: Uuid,
    pub item_name: String,
    pub kind: JobKind,
    pub submitted_at: DateTime<Utc>,
}

/// Result of a successful barrier wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarrierReport {
    /// Jobs joined by this wait.
    pub joined: usize,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Executor is closed")]
    Closed,

    #[error("Invalid {kind} window for {item}: {days} days")]
    InvalidWindow {
        item: String,
        kind: JobKind,
        days: i64,
    },

    #[error("Staging buffers belong to run {buffers}, job is for run {job}")]
    RunMismatch { job: Uuid, buffers: Uuid },

    #[error("Submission rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BarrierError {
    #[error("{lost} job task(s) did not complete: {first}")]
    JobsLost { lost: usize, first: String },

    #[error("Barrier wait failed: {0}")]
    Wait(String),
}

/// Failure reported by a collector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectError {
    /// The job ran and failed.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The job's input was unusable (missing table, bad window...).
    #[error("Invalid input: {0}")]
    Input(String),
}

impl CollectError {
    pub fn status(&self) -> JobStatus {
        match self {
            CollectError::Execution(_) => JobStatus::FailedExecution,
            CollectError::Input(_) => JobStatus::FailedInput,
        }
    }
}
