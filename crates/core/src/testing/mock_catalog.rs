//! In-memory work catalog for testing.

use std::sync::{Arc, Mutex};

use crate::catalog::{CatalogError, WorkCatalog, WorkItem};

/// Mock implementation of the WorkCatalog trait.
#[derive(Clone, Default)]
pub struct MockCatalog {
    items: Arc<Mutex<Vec<WorkItem>>>,
    next_error: Arc<Mutex<Option<CatalogError>>>,
    reads: Arc<Mutex<usize>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<WorkItem>) -> Self {
        let catalog = Self::new();
        catalog.set_items(items);
        catalog
    }

    pub fn set_items(&self, items: Vec<WorkItem>) {
        *self.items.lock().unwrap() = items;
    }

    /// The next read fails with `error`.
    pub fn set_next_error(&self, error: CatalogError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }
}

impl WorkCatalog for MockCatalog {
    fn list_active_work_items(&self) -> Result<Vec<WorkItem>, CatalogError> {
        *self.reads.lock().unwrap() += 1;
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }
        let mut items = self.items.lock().unwrap().clone();
        items.sort_by(|a, b| a.item_name.cmp(&b.item_name));
        Ok(items)
    }
}
