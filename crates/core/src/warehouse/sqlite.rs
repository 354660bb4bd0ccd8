use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::WarehouseError;
use crate::catalog::{CatalogError, TrackedItem, WorkCatalog, WorkItem};
use crate::job::JobStatus;
use crate::staging::{ColumnInfo, MetadataRow, RowHistoryRow};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS work_items (
    item_name TEXT PRIMARY KEY,
    is_active INTEGER NOT NULL DEFAULT 0,
    track_row_history INTEGER NOT NULL DEFAULT 0,
    track_metadata INTEGER NOT NULL DEFAULT 0,
    track_freshness INTEGER NOT NULL DEFAULT 0,
    row_history_window_days INTEGER NOT NULL DEFAULT 1,
    metadata_window_days INTEGER NOT NULL DEFAULT 1,
    last_row_history_status TEXT,
    last_metadata_status TEXT,
    last_run_id TEXT,
    last_collected_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_work_items_active ON work_items(is_active);

CREATE TABLE IF NOT EXISTS row_history (
    item_name TEXT NOT NULL,
    snapshot_date TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    window_days INTEGER NOT NULL,
    collected_at TEXT NOT NULL,
    run_id TEXT NOT NULL,
    PRIMARY KEY (item_name, snapshot_date)
);

CREATE TABLE IF NOT EXISTS table_metadata (
    item_name TEXT PRIMARY KEY,
    column_count INTEGER NOT NULL,
    columns TEXT NOT NULL,
    collected_at TEXT NOT NULL,
    run_id TEXT NOT NULL
);
"#;

/// SQLite-backed catalog and collection targets.
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> WarehouseError {
    WarehouseError::Database(e.to_string())
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, WarehouseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| WarehouseError::Database(format!("Invalid timestamp: {}", e)))
}

fn parse_status(raw: Option<String>) -> Result<Option<JobStatus>, WarehouseError> {
    raw.map(|s| s.parse::<JobStatus>().map_err(WarehouseError::Database))
        .transpose()
}

impl SqliteWarehouse {
    /// Open (or create) the warehouse database and its tables.
    pub fn new(path: &Path) -> Result<Self, WarehouseError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// In-memory warehouse (useful for testing)
    pub fn in_memory() -> Result<Self, WarehouseError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, WarehouseError> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Exclusive access to the connection, for the merge transaction.
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>, WarehouseError> {
        self.conn.lock().map_err(|_| WarehouseError::Poisoned)
    }

    /// Add or update a catalog entry and mark it active.
    ///
    /// Tracking fields from earlier runs are preserved.
    pub fn register_item(&self, item: &WorkItem) -> Result<(), WarehouseError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO work_items (
                item_name, is_active, track_row_history, track_metadata, track_freshness,
                row_history_window_days, metadata_window_days
            ) VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(item_name) DO UPDATE SET
                is_active = 1,
                track_row_history = excluded.track_row_history,
                track_metadata = excluded.track_metadata,
                track_freshness = excluded.track_freshness,
                row_history_window_days = excluded.row_history_window_days,
                metadata_window_days = excluded.metadata_window_days
            "#,
            params![
                item.item_name,
                item.track_row_history,
                item.track_metadata,
                item.track_freshness,
                item.row_history_window_days,
                item.metadata_window_days,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Returns false if the item is unknown.
    pub fn set_active(&self, item_name: &str, active: bool) -> Result<bool, WarehouseError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE work_items SET is_active = ?2 WHERE item_name = ?1",
                params![item_name, active],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Every catalog entry with its tracking fields, ordered by name.
    pub fn tracked_items(&self) -> Result<Vec<TrackedItem>, WarehouseError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT item_name, is_active, track_row_history, track_metadata, track_freshness,
                       row_history_window_days, metadata_window_days,
                       last_row_history_status, last_metadata_status, last_run_id, last_collected_at
                FROM work_items ORDER BY item_name
                "#,
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    WorkItem {
                        item_name: row.get(0)?,
                        track_row_history: row.get(2)?,
                        track_metadata: row.get(3)?,
                        track_freshness: row.get(4)?,
                        row_history_window_days: row.get(5)?,
                        metadata_window_days: row.get(6)?,
                    },
                    row.get::<_, bool>(1)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, Option<String>>(9)?,
                    row.get::<_, Option<String>>(10)?,
                ))
            })
            .map_err(db_err)?;

        let mut items = Vec::new();
        for row in rows {
            let (item, is_active, rh, md, last_run_id, collected_at) = row.map_err(db_err)?;
            items.push(TrackedItem {
                item,
                is_active,
                last_row_history_status: parse_status(rh)?,
                last_metadata_status: parse_status(md)?,
                last_run_id,
                last_collected_at: collected_at.as_deref().map(parse_time).transpose()?,
            });
        }
        Ok(items)
    }

    pub fn row_history(&self, item_name: &str) -> Result<Vec<RowHistoryRow>, WarehouseError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT snapshot_date, row_count, window_days, collected_at FROM row_history WHERE item_name = ?1 ORDER BY snapshot_date",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([item_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_err)?;

        let mut history = Vec::new();
        for row in rows {
            let (date, row_count, window_days, collected_at) = row.map_err(db_err)?;
            history.push(RowHistoryRow {
                item_name: item_name.to_string(),
                snapshot_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| WarehouseError::Database(format!("Invalid date: {}", e)))?,
                row_count,
                window_days,
                collected_at: parse_time(&collected_at)?,
            });
        }
        Ok(history)
    }

    pub fn metadata(&self, item_name: &str) -> Result<Option<MetadataRow>, WarehouseError> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT columns, collected_at FROM table_metadata WHERE item_name = ?1",
                [item_name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        match found {
            Some((columns_json, collected_at)) => {
                let columns: Vec<ColumnInfo> = serde_json::from_str(&columns_json)
                    .map_err(|e| WarehouseError::Serialization(e.to_string()))?;
                Ok(Some(MetadataRow {
                    item_name: item_name.to_string(),
                    columns,
                    collected_at: parse_time(&collected_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Row counts of the two target tables, `(row_history, table_metadata)`.
    pub fn target_row_counts(&self) -> Result<(i64, i64), WarehouseError> {
        let conn = self.lock()?;
        let history: i64 = conn
            .query_row("SELECT COUNT(*) FROM row_history", [], |row| row.get(0))
            .map_err(db_err)?;
        let metadata: i64 = conn
            .query_row("SELECT COUNT(*) FROM table_metadata", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok((history, metadata))
    }
}

impl WorkCatalog for SqliteWarehouse {
    fn list_active_work_items(&self) -> Result<Vec<WorkItem>, CatalogError> {
        let conn = self
            .lock()
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT item_name, track_row_history, track_metadata, track_freshness,
                       row_history_window_days, metadata_window_days
                FROM work_items WHERE is_active = 1 ORDER BY item_name
                "#,
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(WorkItem {
                    item_name: row.get(0)?,
                    track_row_history: row.get(1)?,
                    track_metadata: row.get(2)?,
                    track_freshness: row.get(3)?,
                    row_history_window_days: row.get(4)?,
                    metadata_window_days: row.get(5)?,
                })
            })
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut items = Vec::new();
        for row in rows {
            let item = row.map_err(|e| CatalogError::Database(e.to_string()))?;
            if item.item_name.trim().is_empty() {
                return Err(CatalogError::InvalidEntry {
                    item: item.item_name,
                    reason: "empty item name".to_string(),
                });
            }
            items.push(item);
        }
        Ok(items)
    }
}
