//! The three merge steps, applied in order inside the merge transaction.

use chrono::Utc;
use rusqlite::{params, Transaction};

use crate::driver::{MergeError, MergeStep, StatusConsolidator};
use crate::job::JobKind;
use crate::staging::StagedRun;

fn step_err(step: &str, e: impl std::fmt::Display) -> MergeError {
    MergeError::Step {
        step: step.to_string(),
        reason: e.to_string(),
    }
}

/// Upserts row-history output keyed by (item, snapshot date).
pub struct RowHistoryMerge;

impl MergeStep for RowHistoryMerge {
    fn name(&self) -> &str {
        "row_history"
    }

    fn merge(&self, tx: &Transaction<'_>, staged: &StagedRun) -> Result<usize, MergeError> {
        let mut stmt = tx
            .prepare_cached(
                r#"
                INSERT INTO row_history (item_name, snapshot_date, row_count, window_days, collected_at, run_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(item_name, snapshot_date) DO UPDATE SET
                    row_count = excluded.row_count,
                    window_days = excluded.window_days,
                    collected_at = excluded.collected_at,
                    run_id = excluded.run_id
                "#,
            )
            .map_err(|e| step_err(self.name(), e))?;

        let run_id = staged.run_id.to_string();
        for row in &staged.row_history {
            stmt.execute(params![
                row.item_name,
                row.snapshot_date.format("%Y-%m-%d").to_string(),
                row.row_count,
                row.window_days,
                row.collected_at.to_rfc3339(),
                run_id,
            ])
            .map_err(|e| step_err(self.name(), e))?;
        }
        Ok(staged.row_history.len())
    }
}

/// Upserts the latest schema snapshot keyed by item.
pub struct MetadataMerge;

impl MergeStep for MetadataMerge {
    fn name(&self) -> &str {
        "table_metadata"
    }

    fn merge(&self, tx: &Transaction<'_>, staged: &StagedRun) -> Result<usize, MergeError> {
        let mut stmt = tx
            .prepare_cached(
                r#"
                INSERT INTO table_metadata (item_name, column_count, columns, collected_at, run_id)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(item_name) DO UPDATE SET
                    column_count = excluded.column_count,
                    columns = excluded.columns,
                    collected_at = excluded.collected_at,
                    run_id = excluded.run_id
                "#,
            )
            .map_err(|e| step_err(self.name(), e))?;

        let run_id = staged.run_id.to_string();
        for row in &staged.metadata {
            let columns =
                serde_json::to_string(&row.columns).map_err(|e| step_err(self.name(), e))?;
            stmt.execute(params![
                row.item_name,
                row.column_count() as i64,
                columns,
                row.collected_at.to_rfc3339(),
                run_id,
            ])
            .map_err(|e| step_err(self.name(), e))?;
        }
        Ok(staged.metadata.len())
    }
}

/// Writes each item's latest job statuses back onto its catalog entry.
///
/// A kind the item did not run keeps its previously recorded status.
pub struct TrackingFieldsMerge;

impl MergeStep for TrackingFieldsMerge {
    fn name(&self) -> &str {
        "work_items_tracking"
    }

    fn merge(&self, tx: &Transaction<'_>, staged: &StagedRun) -> Result<usize, MergeError> {
        let mut stmt = tx
            .prepare_cached(
                r#"
                INSERT INTO work_items (item_name, last_row_history_status, last_metadata_status, last_run_id, last_collected_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(item_name) DO UPDATE SET
                    last_row_history_status = COALESCE(excluded.last_row_history_status, work_items.last_row_history_status),
                    last_metadata_status = COALESCE(excluded.last_metadata_status, work_items.last_metadata_status),
                    last_run_id = COALESCE(excluded.last_run_id, work_items.last_run_id),
                    last_collected_at = COALESCE(excluded.last_collected_at, work_items.last_collected_at)
                "#,
            )
            .map_err(|e| step_err(self.name(), e))?;

        let run_id = staged.run_id.to_string();
        let collected_at = Utc::now().to_rfc3339();
        let consolidation = StatusConsolidator::consolidate(&staged.statuses);
        for item in &consolidation.items {
            let status_of = |kind: JobKind| item.jobs.get(&kind).map(|outcome| outcome.status.as_str());
            stmt.execute(params![
                item.item_name,
                status_of(JobKind::RowHistory),
                status_of(JobKind::Metadata),
                run_id,
                collected_at,
            ])
            .map_err(|e| step_err(self.name(), e))?;
        }
        Ok(consolidation.items.len())
    }
}

/// Row history, then metadata, then catalog tracking fields.
pub fn default_merge_steps() -> Vec<Box<dyn MergeStep>> {
    vec![
        Box::new(RowHistoryMerge),
        Box::new(MetadataMerge),
        Box::new(TrackingFieldsMerge),
    ]
}
