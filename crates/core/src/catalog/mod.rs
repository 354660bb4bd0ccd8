//! Work catalog - the set of tables the driver collects for.
//!
//! The catalog is owned by whoever registers tables; the driver only reads
//! the active entries once per run. The SQLite implementation lives with
//! the warehouse because its tracking fields are updated inside the merge
//! transaction.

mod types;

pub use types::*;

/// Read side of the work catalog.
pub trait WorkCatalog: Send + Sync {
    /// Active work items ordered by item name.
    fn list_active_work_items(&self) -> Result<Vec<WorkItem>, CatalogError>;
}
