//! Testing utilities and mock implementations for driver tests.
//!
//! This module provides mock implementations of the driver's seams
//! (catalog, collector, executor, merge step), allowing full runs to be
//! exercised without a real source database.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvester_core::testing::{MockCatalog, MockCollector, ScriptedExecutor};
//!
//! let catalog = MockCatalog::with_items(vec![fixtures::work_item("main.orders")]);
//! let collector = MockCollector::new();
//! collector.fail("main.orders", JobKind::Metadata, CollectError::Input("gone".into()));
//!
//! let executor = ScriptedExecutor::new(Arc::new(TaskExecutor::new(Arc::new(collector), 4)));
//! executor.fail_barrier(1);
//! ```

mod failing_step;
mod mock_catalog;
mod mock_collector;
mod scripted_executor;

pub use failing_step::{FailingMergeStep, FailureMode};
pub use mock_catalog::MockCatalog;
pub use mock_collector::{MockCollector, RecordedCall};
pub use scripted_executor::ScriptedExecutor;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;
    use std::path::Path;

    use chrono::Utc;
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::catalog::WorkItem;
    use crate::driver::{
        DriverResult, DriverStatus, ItemAudit, JobOutcome, OverallItemStatus, PhaseDurations,
    };
    use crate::job::{JobKind, JobStatus};

    /// A work item tracking both row history (7 days) and metadata (1 day).
    pub fn work_item(name: &str) -> WorkItem {
        WorkItem::new(name).with_row_history(7).with_metadata(1)
    }

    /// `count` fully tracked items named `main.table_00`, `main.table_01`, ...
    pub fn work_items(count: usize) -> Vec<WorkItem> {
        (0..count)
            .map(|i| work_item(&format!("main.table_{:02}", i)))
            .collect()
    }

    /// A successful driver result with one fully successful item.
    pub fn driver_result_success() -> DriverResult {
        let mut jobs = BTreeMap::new();
        jobs.insert(
            JobKind::RowHistory,
            JobOutcome {
                status: JobStatus::Success,
                message: None,
            },
        );
        jobs.insert(
            JobKind::Metadata,
            JobOutcome {
                status: JobStatus::Success,
                message: None,
            },
        );
        let now = Utc::now().to_rfc3339();

        DriverResult {
            status: DriverStatus::Success,
            message: "Run completed".to_string(),
            run_id: Uuid::new_v4(),
            start_time: now.clone(),
            end_time: now,
            time_zone: "UTC".to_string(),
            total_tables_found: 1,
            total_jobs_launched: 2,
            total_jobs_succeeded: 2,
            total_jobs_failed: 0,
            item_audit_details: vec![ItemAudit {
                item_name: "main.orders".to_string(),
                jobs,
                overall_item_status: OverallItemStatus::Success,
            }],
            phase_durations_sec: PhaseDurations {
                launch: 0.01,
                wait: 0.2,
                merge: 0.05,
            },
            total_run_duration_sec: 0.3,
        }
    }

    /// Like [`driver_result_success`] but with the given final status.
    pub fn driver_result_with_status(status: DriverStatus) -> DriverResult {
        let mut result = driver_result_success();
        result.status = status;
        if status != DriverStatus::Success {
            result.total_jobs_succeeded = 1;
            result.total_jobs_failed = 1;
            if let Some(audit) = result.item_audit_details.first_mut() {
                audit.jobs.insert(
                    JobKind::Metadata,
                    JobOutcome {
                        status: JobStatus::FailedExecution,
                        message: Some("source unavailable".to_string()),
                    },
                );
                audit.overall_item_status = OverallItemStatus::PartialSuccess;
            }
        }
        result
    }

    /// Create a SQLite source database with one table per entry, each holding `rows` rows.
    pub fn seed_source_db(path: &Path, tables: &[(&str, usize)]) {
        let conn = Connection::open(path).unwrap();
        for (table, rows) in tables {
            conn.execute_batch(&format!(
                "CREATE TABLE {} (id INTEGER PRIMARY KEY, name TEXT NOT NULL, note TEXT);",
                table
            ))
            .unwrap();
            for i in 0..*rows {
                conn.execute(
                    &format!("INSERT INTO {} (name) VALUES (?1)", table),
                    [format!("row-{}", i)],
                )
                .unwrap();
            }
        }
    }
}
