pub mod audit;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod executor;
pub mod job;
pub mod metrics;
pub mod staging;
pub mod testing;
pub mod warehouse;

pub use audit::{
    create_audit_system, AuditError, AuditFilter, AuditHandle, AuditRecord, AuditStore,
    AuditWriter, SqliteAuditStore,
};
pub use catalog::{CatalogError, TrackedItem, WorkCatalog, WorkItem};
pub use config::{
    config_fingerprint, load_config, load_config_from_str, validate_config, Config, ConfigError,
    DatabaseConfig, DriverConfig, ServerConfig, SourceConfig,
};
pub use driver::{DriverError, DriverResult, DriverStatus, HarvestDriver, OverallItemStatus};
pub use executor::{
    Collector, JobExecutor, SqliteProbeCollector, TaskExecutor, UnconfiguredCollector,
};
pub use job::{JobKind, JobStatus};
pub use staging::StagingArea;
pub use warehouse::{SqliteWarehouse, WarehouseError};
