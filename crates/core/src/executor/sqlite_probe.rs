//! Collector that reads row counts and column info straight from a SQLite source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OpenFlags};

use super::{CollectError, CollectionWindow, Collector};
use crate::catalog::WorkItem;
use crate::staging::{ColumnInfo, MetadataRow, RowHistoryRow};

/// Probes tables of a SQLite database file opened read-only per job.
pub struct SqliteProbeCollector {
    path: PathBuf,
}

impl SqliteProbeCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Split `schema.table`; a bare name lives in `main`.
fn split_name(item_name: &str) -> Result<(String, String), CollectError> {
    let (schema, table) = match item_name.split_once('.') {
        Some((schema, table)) => (schema, table),
        None => ("main", item_name),
    };
    if schema.is_empty() || table.is_empty() {
        return Err(CollectError::Input(format!(
            "malformed item name: {}",
            item_name
        )));
    }
    Ok((schema.to_string(), table.to_string()))
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn open(path: &Path) -> Result<Connection, CollectError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| CollectError::Execution(format!("cannot open source {}: {}", path.display(), e)))
}

fn classify(item_name: &str, e: rusqlite::Error) -> CollectError {
    let message = e.to_string();
    if message.contains("no such table") {
        CollectError::Input(format!("{}: {}", item_name, message))
    } else {
        CollectError::Execution(format!("{}: {}", item_name, message))
    }
}

fn count_rows(path: &Path, item_name: &str) -> Result<i64, CollectError> {
    let (schema, table) = split_name(item_name)?;
    let conn = open(path)?;
    let sql = format!("SELECT COUNT(*) FROM {}.{}", quote(&schema), quote(&table));
    conn.query_row(&sql, [], |row| row.get(0))
        .map_err(|e| classify(item_name, e))
}

fn read_columns(path: &Path, item_name: &str) -> Result<Vec<ColumnInfo>, CollectError> {
    let (schema, table) = split_name(item_name)?;
    let conn = open(path)?;
    let mut stmt = conn
        .prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1, ?2) ORDER BY cid")
        .map_err(|e| classify(item_name, e))?;
    let columns = stmt
        .query_map([&table, &schema], |row| {
            let not_null: i64 = row.get(2)?;
            let pk: i64 = row.get(3)?;
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
                nullable: not_null == 0,
                primary_key: pk > 0,
            })
        })
        .map_err(|e| classify(item_name, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| classify(item_name, e))?;

    if columns.is_empty() {
        return Err(CollectError::Input(format!(
            "{}: no such table",
            item_name
        )));
    }
    Ok(columns)
}

#[async_trait]
impl Collector for SqliteProbeCollector {
    async fn collect_row_history(
        &self,
        item: &WorkItem,
        window: &CollectionWindow,
    ) -> Result<Vec<RowHistoryRow>, CollectError> {
        let path = self.path.clone();
        let name = item.item_name.clone();
        let row_count = tokio::task::spawn_blocking(move || count_rows(&path, &name))
            .await
            .map_err(|e| CollectError::Execution(e.to_string()))??;

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
        _window: &CollectionWindow,
    ) -> Result<MetadataRow, CollectError> {
        let path = self.path.clone();
        let name = item.item_name.clone();
        let columns = tokio::task::spawn_blocking(move || read_columns(&path, &name))
            .await
            .map_err(|e| CollectError::Execution(e.to_string()))??;

        Ok(MetadataRow {
            item_name: item.item_name.clone(),
            columns,
            collected_at: Utc::now(),
        })
    }
}
