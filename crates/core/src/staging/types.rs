use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::job::{JobKind, JobStatus};

/// One row-count observation produced by a row-history job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowHistoryRow {
    pub item_name: String,
    /// Date the count belongs to, in the driver's time zone. Dedup key with `item_name`.
    pub snapshot_date: NaiveDate,
    pub row_count: i64,
    pub window_days: i64,
    pub collected_at: DateTime<Utc>,
}

/// A single column as seen by a metadata job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

/// Schema snapshot produced by a metadata job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub item_name: String,
    pub columns: Vec<ColumnInfo>,
    pub collected_at: DateTime<Utc>,
}

impl MetadataRow {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Entry in the status buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Append order within the run.
    pub seq: u64,
    pub item_name: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Everything staged for one run, copied out for consolidation and merge.
#[derive(Debug, Clone, Default)]
pub struct StagedRun {
    pub run_id: Uuid,
    pub row_history: Vec<RowHistoryRow>,
    pub metadata: Vec<MetadataRow>,
    pub statuses: Vec<StatusRecord>,
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Run {0} already has open staging buffers")]
    RunAlreadyOpen(Uuid),

    #[error("Staging buffer poisoned: {0}")]
    Poisoned(&'static str),

    #[error("Row for {found} written through the buffer of {expected}")]
    KeyMismatch { expected: String, found: String },
}
