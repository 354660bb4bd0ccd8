//! The run driver.
//!
//! A run reads the work catalog, launches collection jobs in batches,
//! waits on barriers, consolidates job statuses per item and commits the
//! staged output in one transaction only when every job succeeded.

mod barrier;
mod consolidate;
mod error;
mod launcher;
mod merge;
mod report;
mod runner;
mod types;

pub use barrier::{AwaitBarrier, BarrierPoint};
pub use consolidate::{overall_item_status, Consolidation, StatusConsolidator};
pub use error::DriverError;
pub use launcher::{BatchLauncher, LaunchSummary};
pub use merge::{MergeCoordinator, MergeError, MergeOutcome, MergeStep};
pub use report::AuditReporter;
pub use runner::HarvestDriver;
pub use types::*;
