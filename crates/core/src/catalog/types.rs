use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobKind, JobStatus};

/// One tracked table as read from the catalog.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Qualified name, e.g. `main.orders`.
    pub item_name: String,
    pub track_row_history: bool,
    pub track_metadata: bool,
    /// Carried through from the catalog; no job is launched for it.
    pub track_freshness: bool,
    pub row_history_window_days: i64,
    pub metadata_window_days: i64,
}

impl WorkItem {
    /// New item with every capability disabled and one-day windows.
    pub fn new(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            track_row_history: false,
            track_metadata: false,
            track_freshness: false,
            row_history_window_days: 1,
            metadata_window_days: 1,
        }
    }

    pub fn with_row_history(mut self, window_days: i64) -> Self {
        self.track_row_history = true;
        self.row_history_window_days = window_days;
        self
    }

    pub fn with_metadata(mut self, window_days: i64) -> Self {
        self.track_metadata = true;
        self.metadata_window_days = window_days;
        self
    }

    pub fn with_freshness(mut self) -> Self {
        self.track_freshness = true;
        self
    }

    pub fn tracks(&self, kind: JobKind) -> bool {
        match kind {
            JobKind::RowHistory => self.track_row_history,
            JobKind::Metadata => self.track_metadata,
        }
    }

    /// Kinds to launch for this item, in launch order.
    pub fn job_kinds(&self) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| self.tracks(*kind))
            .collect()
    }

    pub fn window_for(&self, kind: JobKind) -> i64 {
        match kind {
            JobKind::RowHistory => self.row_history_window_days,
            JobKind::Metadata => self.metadata_window_days,
        }
    }
}

/// A catalog entry together with the tracking fields written by the last committed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedItem {
    #[serde(flatten)]
    pub item: WorkItem,
    pub is_active: bool,
    pub last_row_history_status: Option<JobStatus>,
    pub last_metadata_status: Option<JobStatus>,
    pub last_run_id: Option<String>,
    pub last_collected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid catalog entry {item}: {reason}")]
    InvalidEntry { item: String, reason: String },
}
