use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{AuditError, AuditFilter, AuditRecord, AuditStore};
use crate::driver::{DriverResult, DriverStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS driver_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL UNIQUE,
    recorded_at TEXT NOT NULL,
    status TEXT NOT NULL,
    config_hash TEXT,
    total_jobs_launched INTEGER NOT NULL,
    total_jobs_failed INTEGER NOT NULL,
    result TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_driver_runs_recorded_at ON driver_runs(recorded_at);
CREATE INDEX IF NOT EXISTS idx_driver_runs_status ON driver_runs(status);
"#;

type RawRow = (i64, String, String, String, Option<String>, String);

/// SQLite-backed audit store
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Create a new SQLite audit store, creating the database file and tables if needed
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(|e| AuditError::Database(e.to_string()))?;
        Self::init(conn)
    }

    /// Create an in-memory SQLite audit store (useful for testing)
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| AuditError::Database(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, AuditError> {
        // Shares the database file with the warehouse connection.
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| AuditError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| AuditError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn build_where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref from) = filter.from {
            conditions.push("recorded_at >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        if let Some(ref to) = filter.to {
            conditions.push("recorded_at <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn decode(raw: RawRow) -> Result<AuditRecord, AuditError> {
        let (id, run_id, recorded_at, status, config_hash, result_json) = raw;

        let run_id = Uuid::parse_str(&run_id)
            .map_err(|e| AuditError::Database(format!("Invalid run id: {}", e)))?;
        let recorded_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|e| AuditError::Database(format!("Invalid timestamp: {}", e)))?
            .into();
        let status: DriverStatus = status.parse().map_err(AuditError::Database)?;
        let result: DriverResult = serde_json::from_str(&result_json)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        Ok(AuditRecord {
            id,
            run_id,
            recorded_at,
            status,
            config_hash,
            result,
        })
    }
}

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

impl AuditStore for SqliteAuditStore {
    fn append(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AuditError::Database("connection poisoned".to_string()))?;

        let result_json = serde_json::to_string(&record.result)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        let inserted = conn.execute(
            "INSERT INTO driver_runs (run_id, recorded_at, status, config_hash, total_jobs_launched, total_jobs_failed, result) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                record.run_id.to_string(),
                record.recorded_at.to_rfc3339(),
                record.status.as_str(),
                record.config_hash,
                record.result.total_jobs_launched as i64,
                record.result.total_jobs_failed as i64,
                result_json,
            ],
        );

        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AuditError::Duplicate(record.run_id))
            }
            Err(e) => Err(AuditError::Database(e.to_string())),
        }
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AuditError::Database("connection poisoned".to_string()))?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT id, run_id, recorded_at, status, config_hash, result FROM driver_runs {} ORDER BY recorded_at DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), raw_row)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            let raw = row_result.map_err(|e| AuditError::Database(e.to_string()))?;
            records.push(Self::decode(raw)?);
        }

        Ok(records)
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AuditError::Database("connection poisoned".to_string()))?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM driver_runs {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| AuditError::Database(e.to_string()))
    }

    fn get(&self, run_id: Uuid) -> Result<Option<AuditRecord>, AuditError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AuditError::Database("connection poisoned".to_string()))?;

        let raw = conn
            .query_row(
                "SELECT id, run_id, recorded_at, status, config_hash, result FROM driver_runs WHERE run_id = ?",
                [run_id.to_string()],
                raw_row,
            )
            .optional()
            .map_err(|e| AuditError::Database(e.to_string()))?;

        raw.map(Self::decode).transpose()
    }
}
