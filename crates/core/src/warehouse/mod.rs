//! Persistent stores written by the merge coordinator.
//!
//! The catalog table and both collection targets share one SQLite
//! connection so a single transaction covers every merge step.

mod sqlite;
mod steps;

pub use sqlite::SqliteWarehouse;
pub use steps::{default_merge_steps, MetadataMerge, RowHistoryMerge, TrackingFieldsMerge};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Warehouse connection poisoned")]
    Poisoned,
}
