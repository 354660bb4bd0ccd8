use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::driver::{DriverResult, DriverStatus};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Run already audited: {0}")]
    Duplicate(Uuid),
}

/// Immutable snapshot of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Assigned by the store.
    pub id: i64,
    pub run_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub status: DriverStatus,
    /// Fingerprint of the configuration the run used.
    pub config_hash: Option<String>,
    pub result: DriverResult,
}

impl AuditRecord {
    pub fn new(result: DriverResult, config_hash: Option<String>) -> Self {
        Self {
            id: 0,
            run_id: result.run_id,
            recorded_at: Utc::now(),
            status: result.status,
            config_hash,
            result,
        }
    }
}

/// Filter for querying audit records
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub status: Option<DriverStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: DriverStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Append-only storage for run audit records, keyed by run id.
pub trait AuditStore: Send + Sync {
    /// Append a record, returns the assigned ID
    fn append(&self, record: &AuditRecord) -> Result<i64, AuditError>;

    /// Query records, newest first
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;

    /// Count matching records
    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError>;

    /// Look up one run
    fn get(&self, run_id: Uuid) -> Result<Option<AuditRecord>, AuditError>;
}
