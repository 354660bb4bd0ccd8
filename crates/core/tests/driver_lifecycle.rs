//! Driver lifecycle integration tests.
//!
//! These tests run the driver end to end against a SQLite warehouse:
//! catalog -> launch -> barriers -> consolidate -> merge -> result/audit

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use harvester_core::{
    create_audit_system,
    driver::{MergeStep, OverallItemStatus},
    executor::CollectError,
    testing::{
        fixtures, FailingMergeStep, FailureMode, MockCatalog, MockCollector, ScriptedExecutor,
    },
    warehouse::{MetadataMerge, RowHistoryMerge, TrackingFieldsMerge},
    AuditStore, CatalogError, DriverConfig, DriverStatus, HarvestDriver, JobKind, JobStatus,
    SqliteAuditStore, SqliteProbeCollector, SqliteWarehouse, TaskExecutor, WorkItem,
};

/// Test helper wiring a warehouse-backed catalog to a scripted executor.
struct TestHarness {
    warehouse: Arc<SqliteWarehouse>,
    collector: MockCollector,
    executor: Arc<ScriptedExecutor>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new(items: &[WorkItem]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let warehouse = Arc::new(
            SqliteWarehouse::new(&temp_dir.path().join("warehouse.db"))
                .expect("Failed to create warehouse"),
        );
        for item in items {
            warehouse.register_item(item).expect("Failed to register item");
        }

        let collector = MockCollector::new();
        let executor = Arc::new(ScriptedExecutor::new(Arc::new(TaskExecutor::new(
            Arc::new(collector.clone()),
            4,
        ))));

        Self {
            warehouse,
            collector,
            executor,
            temp_dir,
        }
    }

    fn config(batch_size: i64) -> DriverConfig {
        DriverConfig {
            batch_size,
            time_zone: "UTC".to_string(),
            max_concurrent_jobs: 4,
        }
    }

    fn driver(&self, batch_size: i64) -> HarvestDriver {
        HarvestDriver::new(
            &Self::config(batch_size),
            self.warehouse.clone(),
            self.executor.clone(),
            self.warehouse.clone(),
        )
        .expect("Failed to create driver")
    }
}

#[tokio::test]
async fn test_successful_run_commits_everything() {
    let harness = TestHarness::new(&fixtures::work_items(3));

    let result = harness.driver(2).run().await;

    assert_eq!(result.status, DriverStatus::Success);
    assert_eq!(result.total_tables_found, 3);
    assert_eq!(result.total_jobs_launched, 6);
    assert_eq!(result.total_jobs_succeeded, 6);
    assert_eq!(result.total_jobs_failed, 0);
    assert_eq!(result.item_audit_details.len(), 3);
    assert!(result
        .item_audit_details
        .iter()
        .all(|item| item.overall_item_status == OverallItemStatus::Success));

    // Barriers after jobs 2, 4 and 6; nothing left for a final drain.
    assert_eq!(harness.executor.barrier_calls(), 3);
    assert_eq!(harness.executor.barrier_sizes(), vec![2, 2, 2]);
    assert_eq!(result.phase_durations_sec.wait, 0.0);

    assert_eq!(harness.warehouse.target_row_counts().unwrap(), (3, 3));
    let tracked = harness.warehouse.tracked_items().unwrap();
    assert!(tracked.iter().all(|t| {
        t.last_row_history_status == Some(JobStatus::Success)
            && t.last_metadata_status == Some(JobStatus::Success)
            && t.last_run_id.as_deref() == Some(result.run_id.to_string().as_str())
    }));
}

#[tokio::test]
async fn test_final_drain_for_partial_batch() {
    let harness = TestHarness::new(&fixtures::work_items(3));

    let result = harness.driver(4).run().await;

    assert_eq!(result.status, DriverStatus::Success);
    assert_eq!(harness.executor.barrier_calls(), 2);
    assert_eq!(harness.executor.barrier_sizes(), vec![4, 2]);
}

#[tokio::test]
async fn test_batching_disabled_waits_once() {
    let harness = TestHarness::new(&fixtures::work_items(3));

    let result = harness.driver(0).run().await;

    assert_eq!(result.status, DriverStatus::Success);
    assert_eq!(harness.executor.barrier_calls(), 1);
    assert_eq!(harness.executor.barrier_sizes(), vec![6]);
}

#[tokio::test]
async fn test_execution_failure_skips_merge() {
    let harness = TestHarness::new(&fixtures::work_items(3));
    harness.collector.fail(
        "main.table_01",
        JobKind::Metadata,
        CollectError::Execution("connection reset".to_string()),
    );

    let result = harness.driver(2).run().await;

    assert_eq!(result.status, DriverStatus::FailedOverall);
    assert_eq!(result.total_jobs_launched, 6);
    assert_eq!(result.total_jobs_succeeded, 5);
    assert_eq!(result.total_jobs_failed, 1);
    assert_eq!(result.phase_durations_sec.merge, 0.0);
    assert!(result.message.contains("merge skipped"));

    let failed = result
        .item_audit_details
        .iter()
        .find(|item| item.item_name == "main.table_01")
        .unwrap();
    assert_eq!(failed.overall_item_status, OverallItemStatus::Failed);
    let outcome = &failed.jobs[&JobKind::Metadata];
    assert_eq!(outcome.status, JobStatus::FailedExecution);
    assert!(outcome.message.as_deref().unwrap().contains("connection reset"));

    // Nothing from the run reached the targets.
    assert_eq!(harness.warehouse.target_row_counts().unwrap(), (0, 0));
    assert!(harness
        .warehouse
        .tracked_items()
        .unwrap()
        .iter()
        .all(|t| t.last_run_id.is_none()));
}

#[tokio::test]
async fn test_input_failure_is_reported_per_kind() {
    let harness = TestHarness::new(&fixtures::work_items(1));
    harness.collector.fail(
        "main.table_00",
        JobKind::RowHistory,
        CollectError::Input("no such table".to_string()),
    );

    let result = harness.driver(10).run().await;

    assert_eq!(result.status, DriverStatus::FailedOverall);
    let item = &result.item_audit_details[0];
    assert_eq!(item.jobs[&JobKind::RowHistory].status, JobStatus::FailedInput);
    assert_eq!(item.jobs[&JobKind::Metadata].status, JobStatus::Success);
    assert_eq!(item.overall_item_status, OverallItemStatus::Failed);
}

#[tokio::test]
async fn test_submission_failure_continues_launching() {
    let harness = TestHarness::new(&fixtures::work_items(2));
    harness.executor.reject("main.table_00", JobKind::RowHistory);

    let result = harness.driver(10).run().await;

    assert_eq!(result.status, DriverStatus::FailedOverall);
    assert_eq!(result.total_jobs_launched, 3);
    assert_eq!(result.total_jobs_succeeded, 3);
    assert_eq!(result.total_jobs_failed, 1);
    assert_eq!(harness.collector.call_count(), 3);
    assert_eq!(
        result.item_audit_details[0].jobs[&JobKind::RowHistory].status,
        JobStatus::FailedSubmission
    );
    assert_eq!(harness.warehouse.target_row_counts().unwrap(), (0, 0));
}

#[tokio::test]
async fn test_barrier_failure_fails_run() {
    let harness = TestHarness::new(&fixtures::work_items(2));
    harness.executor.fail_barrier(1);

    let result = harness.driver(2).run().await;

    assert_eq!(result.status, DriverStatus::FailedOverall);
    assert_eq!(result.total_jobs_succeeded, 4);
    assert_eq!(harness.warehouse.target_row_counts().unwrap(), (0, 0));
}

#[tokio::test]
async fn test_lost_job_leaves_mixed_status() {
    let harness = TestHarness::new(&fixtures::work_items(2));
    harness.collector.panic_on("main.table_01", JobKind::RowHistory);

    let result = harness.driver(0).run().await;

    assert_eq!(result.status, DriverStatus::FailedOverall);
    let lost = result
        .item_audit_details
        .iter()
        .find(|item| item.item_name == "main.table_01")
        .unwrap();
    assert_eq!(lost.jobs[&JobKind::RowHistory].status, JobStatus::Submitted);
    assert_eq!(lost.overall_item_status, OverallItemStatus::MixedStatus);
    assert_eq!(harness.warehouse.target_row_counts().unwrap(), (0, 0));
}

#[tokio::test]
async fn test_merge_step_failure_rolls_back_earlier_steps() {
    let harness = TestHarness::new(&fixtures::work_items(2));
    let steps: Vec<Box<dyn MergeStep>> = vec![
        Box::new(RowHistoryMerge),
        Box::new(FailingMergeStep::new("table_metadata", FailureMode::Step)),
        Box::new(TrackingFieldsMerge),
    ];
    let driver = harness.driver(10).with_merge_steps(steps);

    let result = driver.run().await;

    assert_eq!(result.status, DriverStatus::FailedOverall);
    assert_eq!(result.total_jobs_succeeded, 4);
    assert!(result.message.contains("rolled back at step table_metadata"));
    assert_eq!(harness.warehouse.target_row_counts().unwrap(), (0, 0));
    assert!(harness
        .warehouse
        .tracked_items()
        .unwrap()
        .iter()
        .all(|t| t.last_row_history_status.is_none()));
}

#[tokio::test]
async fn test_storage_failure_is_critical() {
    let harness = TestHarness::new(&fixtures::work_items(2));
    let steps: Vec<Box<dyn MergeStep>> = vec![
        Box::new(RowHistoryMerge),
        Box::new(MetadataMerge),
        Box::new(FailingMergeStep::new("broken", FailureMode::Storage)),
    ];
    let driver = harness.driver(10).with_merge_steps(steps);

    let result = driver.run().await;

    assert_eq!(result.status, DriverStatus::CriticalFailure);
    assert_eq!(result.total_jobs_launched, 4);
    assert_eq!(result.total_jobs_succeeded, 0);
    assert_eq!(result.total_jobs_failed, 4);
    assert!(result.message.contains("rolled back"));
    assert_eq!(harness.warehouse.target_row_counts().unwrap(), (0, 0));
    assert_eq!(harness.executor.aborted_runs(), vec![result.run_id]);
}

#[tokio::test]
async fn test_catalog_failure_is_critical() {
    let harness = TestHarness::new(&[]);
    let catalog = Arc::new(MockCatalog::with_items(fixtures::work_items(2)));
    catalog.set_next_error(CatalogError::Database("disk I/O error".to_string()));
    let driver = HarvestDriver::new(
        &TestHarness::config(10),
        catalog.clone(),
        harness.executor.clone(),
        harness.warehouse.clone(),
    )
    .unwrap();

    let result = driver.run().await;

    assert_eq!(result.status, DriverStatus::CriticalFailure);
    assert_eq!(result.total_tables_found, 0);
    assert_eq!(result.total_jobs_launched, 0);
    assert!(result.item_audit_details.is_empty());
    assert!(result.message.contains("disk I/O error"));
    assert_eq!(harness.collector.call_count(), 0);

    // The catalog recovers; the next run is independent.
    let result = driver.run().await;
    assert_eq!(result.status, DriverStatus::Success);
    assert_eq!(catalog.reads(), 2);
}

#[tokio::test]
async fn test_empty_catalog_succeeds() {
    let harness = TestHarness::new(&[]);

    let result = harness.driver(10).run().await;

    assert_eq!(result.status, DriverStatus::Success);
    assert_eq!(result.total_tables_found, 0);
    assert_eq!(result.total_jobs_launched, 0);
    assert_eq!(harness.executor.barrier_calls(), 0);
}

#[tokio::test]
async fn test_inactive_and_untracked_items() {
    let harness = TestHarness::new(&[
        fixtures::work_item("main.active"),
        fixtures::work_item("main.retired"),
        WorkItem::new("main.freshness_only").with_freshness(),
        WorkItem::new("main.history_only").with_row_history(3),
    ]);
    harness.warehouse.set_active("main.retired", false).unwrap();

    let result = harness.driver(10).run().await;

    assert_eq!(result.status, DriverStatus::Success);
    assert_eq!(result.total_tables_found, 3);
    assert_eq!(result.total_jobs_launched, 3);

    let names: Vec<&str> = result
        .item_audit_details
        .iter()
        .map(|item| item.item_name.as_str())
        .collect();
    assert_eq!(names, vec!["main.active", "main.history_only"]);
    let history_only = &result.item_audit_details[1];
    assert_eq!(
        history_only.overall_item_status,
        OverallItemStatus::PartialSuccess
    );
    assert!(!history_only.jobs.contains_key(&JobKind::Metadata));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = TestHarness::new(&fixtures::work_items(3));
    let driver = harness.driver(2);

    let first = driver.run().await;
    let counts_after_first = harness.warehouse.target_row_counts().unwrap();
    let second = driver.run().await;

    assert_eq!(first.status, DriverStatus::Success);
    assert_eq!(second.status, DriverStatus::Success);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(
        harness.warehouse.target_row_counts().unwrap(),
        counts_after_first
    );
    assert_eq!(driver.staging().open_runs(), 0);
}

#[tokio::test]
async fn test_concurrency_is_capped() {
    let temp_dir = TempDir::new().unwrap();
    let warehouse = Arc::new(SqliteWarehouse::new(&temp_dir.path().join("w.db")).unwrap());
    for item in fixtures::work_items(4) {
        warehouse.register_item(&item).unwrap();
    }
    let collector = MockCollector::new();
    collector.set_delay(Duration::from_millis(20));
    let executor = Arc::new(TaskExecutor::new(Arc::new(collector.clone()), 2));

    let driver = HarvestDriver::new(
        &TestHarness::config(0),
        warehouse.clone(),
        executor,
        warehouse.clone(),
    )
    .unwrap();
    let result = driver.run().await;

    assert_eq!(result.status, DriverStatus::Success);
    assert_eq!(collector.call_count(), 8);
    assert!(collector.max_in_flight() <= 2);
}

#[tokio::test]
async fn test_result_uses_configured_time_zone() {
    let harness = TestHarness::new(&fixtures::work_items(1));
    let config = DriverConfig {
        batch_size: 10,
        time_zone: "Asia/Tokyo".to_string(),
        max_concurrent_jobs: 4,
    };
    let driver = HarvestDriver::new(
        &config,
        harness.warehouse.clone(),
        harness.executor.clone(),
        harness.warehouse.clone(),
    )
    .unwrap();

    let result = driver.run().await;

    assert_eq!(result.time_zone, "Asia/Tokyo");
    assert!(result.start_time.ends_with("+09:00"));
    assert!(result.end_time.ends_with("+09:00"));
    assert!(result.total_run_duration_sec >= 0.0);
}

#[tokio::test]
async fn test_invalid_time_zone_is_rejected() {
    let harness = TestHarness::new(&[]);
    let config = DriverConfig {
        batch_size: 10,
        time_zone: "Mars/Olympus".to_string(),
        max_concurrent_jobs: 4,
    };

    let result = HarvestDriver::new(
        &config,
        harness.warehouse.clone(),
        harness.executor.clone(),
        harness.warehouse.clone(),
    );

    assert!(result.is_err());
}

#[tokio::test]
async fn test_audit_record_is_persisted() {
    let harness = TestHarness::new(&fixtures::work_items(2));
    let store = Arc::new(SqliteAuditStore::new(&harness.temp_dir.path().join("warehouse.db")).unwrap());
    let (handle, writer) = create_audit_system(store.clone(), 16);
    let writer_task = tokio::spawn(writer.run());

    let driver = harness
        .driver(10)
        .with_audit(handle.with_config_hash("abc123"));
    let success = driver.run().await;
    harness.collector.fail(
        "main.table_00",
        JobKind::Metadata,
        CollectError::Execution("boom".to_string()),
    );
    let failure = driver.run().await;

    drop(driver);
    writer_task.await.unwrap();

    let record = store.get(success.run_id).unwrap().expect("run not audited");
    assert_eq!(record.status, DriverStatus::Success);
    assert_eq!(record.config_hash.as_deref(), Some("abc123"));
    assert_eq!(record.result, success);

    let record = store.get(failure.run_id).unwrap().unwrap();
    assert_eq!(record.status, DriverStatus::FailedOverall);
    assert_eq!(record.result.total_jobs_failed, 1);
}

#[tokio::test]
async fn test_sqlite_probe_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("source.db");
    fixtures::seed_source_db(&source, &[("orders", 5), ("customers", 2)]);

    let warehouse = Arc::new(SqliteWarehouse::new(&temp_dir.path().join("warehouse.db")).unwrap());
    warehouse.register_item(&fixtures::work_item("main.orders")).unwrap();
    warehouse.register_item(&fixtures::work_item("main.customers")).unwrap();

    let executor = Arc::new(TaskExecutor::new(
        Arc::new(SqliteProbeCollector::new(&source)),
        4,
    ));
    let driver = HarvestDriver::new(
        &TestHarness::config(3),
        warehouse.clone(),
        executor,
        warehouse.clone(),
    )
    .unwrap();

    let result = driver.run().await;
    assert_eq!(result.status, DriverStatus::Success);
    assert_eq!(result.total_jobs_succeeded, 4);

    let history = warehouse.row_history("main.orders").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].row_count, 5);
    assert_eq!(history[0].window_days, 7);
    let metadata = warehouse.metadata("main.customers").unwrap().unwrap();
    assert_eq!(metadata.column_count(), 3);

    // A table that disappears from the source fails with an input error.
    warehouse.register_item(&fixtures::work_item("main.missing")).unwrap();
    let result = driver.run().await;
    assert_eq!(result.status, DriverStatus::FailedOverall);
    let missing = result
        .item_audit_details
        .iter()
        .find(|item| item.item_name == "main.missing")
        .unwrap();
    assert_eq!(missing.jobs[&JobKind::RowHistory].status, JobStatus::FailedInput);
    assert_eq!(missing.jobs[&JobKind::Metadata].status, JobStatus::FailedInput);
    assert!(warehouse.row_history("main.missing").unwrap().is_empty());
}
