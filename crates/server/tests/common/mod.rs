//! Common test utilities for in-process API testing.
//!
//! This module provides a test fixture that builds the real router over a
//! temporary SQLite warehouse, with a mock collector standing in for the
//! source database.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use harvester_core::{
    create_audit_system,
    driver::MergeStep,
    testing::MockCollector,
    AuditStore, Config, DatabaseConfig, DriverConfig, HarvestDriver, ServerConfig,
    SqliteAuditStore, SqliteWarehouse, TaskExecutor, WorkItem,
};
use harvester_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use harvester_core::testing::fixtures;

/// Test fixture for in-process API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_trigger_run() {
///     let fixture = TestFixture::new().await;
///     fixture.register_items(&fixtures::work_items(2));
///
///     let response = fixture.post("/api/v1/runs").await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Catalog and collection targets
    pub warehouse: Arc<SqliteWarehouse>,
    /// Mock collector - script job outcomes
    pub collector: MockCollector,
    /// Audit store the writer persists into
    pub audit_store: Arc<dyn AuditStore>,
    /// Temporary directory for the test database
    #[allow(dead_code)]
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with the default merge steps.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Create a test fixture whose driver merges with `steps`.
    pub async fn with_merge_steps(steps: Vec<Box<dyn MergeStep>>) -> Self {
        Self::build(Some(steps)).await
    }

    async fn build(steps: Option<Vec<Box<dyn MergeStep>>>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            driver: DriverConfig {
                batch_size: 2,
                time_zone: "UTC".to_string(),
                max_concurrent_jobs: 4,
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            source: None,
        };

        // Create stores
        let warehouse =
            Arc::new(SqliteWarehouse::new(&db_path).expect("Failed to create warehouse"));
        let audit_store: Arc<dyn AuditStore> =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));

        // Create audit system
        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let collector = MockCollector::new();
        let executor = Arc::new(TaskExecutor::new(Arc::new(collector.clone()), 4));

        let mut driver = HarvestDriver::new(
            &config.driver,
            warehouse.clone(),
            executor.clone(),
            Arc::clone(&warehouse),
        )
        .expect("Failed to create driver")
        .with_audit(audit_handle.with_config_hash("test-config"));
        if let Some(steps) = steps {
            driver = driver.with_merge_steps(steps);
        }

        let state = Arc::new(AppState::new(
            config,
            driver,
            executor,
            Arc::clone(&warehouse),
            Arc::clone(&audit_store),
        ));

        Self {
            router: create_router(state),
            warehouse,
            collector,
            audit_store,
            temp_dir,
        }
    }

    /// Register catalog entries as active work items.
    pub fn register_items(&self, items: &[WorkItem]) {
        for item in items {
            self.warehouse
                .register_item(item)
                .expect("Failed to register item");
        }
    }

    /// Wait until the audit writer has persisted `run_id`.
    pub async fn wait_for_audit(&self, run_id: &str) {
        let run_id = Uuid::parse_str(run_id).expect("Invalid run id");
        for _ in 0..100 {
            if let Ok(Some(_)) = self.audit_store.get(run_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Run {} was never audited", run_id);
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request without a body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
