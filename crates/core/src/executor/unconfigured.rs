//! Collector used when no source database is configured.

use async_trait::async_trait;

use super::{CollectError, CollectionWindow, Collector};
use crate::catalog::WorkItem;
use crate::staging::{MetadataRow, RowHistoryRow};

/// Fails every job with an execution error, so runs report instead of crash.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredCollector;

const REASON: &str = "no source database configured";

#[async_trait]
impl Collector for UnconfiguredCollector {
    async fn collect_row_history(
        &self,
        _item: &WorkItem,
        _window: &CollectionWindow,
    ) -> Result<Vec<RowHistoryRow>, CollectError> {
        Err(CollectError::Execution(REASON.to_string()))
    }

    async fn collect_metadata(
        &self,
        _item: &WorkItem,
        _window: &CollectionWindow,
    ) -> Result<MetadataRow, CollectError> {
        Err(CollectError::Execution(REASON.to_string()))
    }
}
