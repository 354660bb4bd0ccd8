use thiserror::Error;

use super::MergeError;
use crate::catalog::CatalogError;
use crate::staging::StagingError;

/// Unexpected failures. Any of these aborts the run with `CRITICAL_FAILURE`.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Catalog read failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("Merge transaction failed: {0}")]
    Merge(#[from] MergeError),

    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),
}
