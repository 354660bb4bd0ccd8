use std::sync::Arc;

use harvester_core::{AuditStore, Config, HarvestDriver, SqliteWarehouse, TaskExecutor};

/// Shared application state
pub struct AppState {
    config: Config,
    driver: HarvestDriver,
    executor: Arc<TaskExecutor>,
    warehouse: Arc<SqliteWarehouse>,
    audit_store: Arc<dyn AuditStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        driver: HarvestDriver,
        executor: Arc<TaskExecutor>,
        warehouse: Arc<SqliteWarehouse>,
        audit_store: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            config,
            driver,
            executor,
            warehouse,
            audit_store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn driver(&self) -> &HarvestDriver {
        &self.driver
    }

    pub fn executor(&self) -> &TaskExecutor {
        self.executor.as_ref()
    }

    pub fn warehouse(&self) -> &SqliteWarehouse {
        self.warehouse.as_ref()
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }
}
