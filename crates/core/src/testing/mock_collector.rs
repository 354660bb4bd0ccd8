//! Mock collector for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::catalog::WorkItem;
use crate::executor::{CollectError, CollectionWindow, Collector};
use crate::job::JobKind;
use crate::staging::{ColumnInfo, MetadataRow, RowHistoryRow};

/// A recorded collection call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub item_name: String,
    pub kind: JobKind,
    pub window_days: i64,
}

#[derive(Debug, Clone)]
enum Scripted {
    Fail(CollectError),
    Panic,
}

/// Mock implementation of the Collector trait.
///
/// Succeeds by default with one row-history row and a single-column schema.
/// Individual (item, kind) pairs can be scripted to fail or panic.
///
/// # Example
///
/// ```rust,ignore
/// let collector = MockCollector::new();
/// collector.fail("main.orders", JobKind::Metadata, CollectError::Input("gone".into()));
/// collector.set_delay(Duration::from_millis(20));
/// ```
#[derive(Clone, Default)]
pub struct MockCollector {
    scripted: Arc<Mutex<HashMap<(String, JobKind), Scripted>>>,
    row_counts: Arc<Mutex<HashMap<String, i64>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCollector")
            .field("calls", &self.call_count())
            .finish()
    }
}

impl MockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the job for (item, kind) fail with `error`.
    pub fn fail(&self, item_name: &str, kind: JobKind, error: CollectError) {
        self.scripted
            .lock()
            .unwrap()
            .insert((item_name.to_string(), kind), Scripted::Fail(error));
    }

    /// Make the job for (item, kind) panic, so its task never completes.
    pub fn panic_on(&self, item_name: &str, kind: JobKind) {
        self.scripted
            .lock()
            .unwrap()
            .insert((item_name.to_string(), kind), Scripted::Panic);
    }

    pub fn set_row_count(&self, item_name: &str, count: i64) {
        self.row_counts
            .lock()
            .unwrap()
            .insert(item_name.to_string(), count);
    }

    /// Sleep this long inside every collection.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of collections observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, item: &WorkItem, kind: JobKind, window: &CollectionWindow) -> Result<(), CollectError> {
        self.calls.lock().unwrap().push(RecordedCall {
            item_name: item.item_name.clone(),
            kind,
            window_days: window.days,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get(&(item.item_name.clone(), kind))
            .cloned();
        match scripted {
            Some(Scripted::Fail(e)) => Err(e),
            Some(Scripted::Panic) => panic!("scripted panic for {} {}", item.item_name, kind),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Collector for MockCollector {
    async fn collect_row_history(
        &self,
        item: &WorkItem,
        window: &CollectionWindow,
    ) -> Result<Vec<RowHistoryRow>, CollectError> {
        self.enter(item, JobKind::RowHistory, window).await?;
        let row_count = self
            .row_counts
            .lock()
            .unwrap()
            .get(&item.item_name)
            .copied()
            .unwrap_or(100);
        Ok(vec![RowHistoryRow {
            item_name: item.item_name.clone(),
            snapshot_date: window.snapshot_date,
            row_count,
            window_days: window.days,
            collected_at: Utc::now(),
        }])
    }

    async fn collect_metadata(
        &self,
        item: &WorkItem,
        window: &CollectionWindow,
    ) -> Result<MetadataRow, CollectError> {
        self.enter(item, JobKind::Metadata, window).await?;
        Ok(MetadataRow {
            item_name: item.item_name.clone(),
            columns: vec![ColumnInfo {
                name: "id".to_string(),
                data_type: "INTEGER".to_string(),
                nullable: false,
                primary_key: true,
            }],
            collected_at: Utc::now(),
        })
    }
}
