use std::sync::Arc;

use rusqlite::Transaction;
use thiserror::Error;
use tracing::{info, warn};

use super::RunContext;
use crate::metrics;
use crate::staging::StagedRun;
use crate::warehouse::SqliteWarehouse;

#[derive(Debug, Error)]
pub enum MergeError {
    /// The step itself failed. Rolls the run back without escalating.
    #[error("Merge step {step} failed: {reason}")]
    Step { step: String, reason: String },

    /// The transaction could not be used at all.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// One idempotent upsert from staged output into a persistent store.
pub trait MergeStep: Send + Sync {
    fn name(&self) -> &str;

    /// Apply the step inside `tx`, returning the number of rows written.
    fn merge(&self, tx: &Transaction<'_>, staged: &StagedRun) -> Result<usize, MergeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Committed { rows: Vec<(String, usize)> },
    RolledBack { step: String, reason: String },
}

/// Runs the merge steps in order inside one transaction.
pub struct MergeCoordinator {
    warehouse: Arc<SqliteWarehouse>,
    steps: Vec<Box<dyn MergeStep>>,
}

impl MergeCoordinator {
    pub fn new(warehouse: Arc<SqliteWarehouse>, steps: Vec<Box<dyn MergeStep>>) -> Self {
        Self { warehouse, steps }
    }

    pub fn warehouse(&self) -> Arc<SqliteWarehouse> {
        Arc::clone(&self.warehouse)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// All steps commit together or none do.
    ///
    /// A [`MergeError::Step`] is recorded on the context and rolled back here.
    /// Anything else is returned; the open transaction rolls back on drop.
    pub fn commit(
        &self,
        staged: &StagedRun,
        ctx: &mut RunContext,
    ) -> Result<MergeOutcome, MergeError> {
        let mut conn = self
            .warehouse
            .lock()
            .map_err(|e| MergeError::Storage(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| MergeError::Storage(format!("cannot begin transaction: {}", e)))?;

        let mut rows = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step.merge(&tx, staged) {
                Ok(written) => {
                    metrics::MERGE_ROWS
                        .with_label_values(&[step.name()])
                        .inc_by(written as u64);
                    rows.push((step.name().to_string(), written));
                }
                Err(MergeError::Step {
                    step: failed,
                    reason,
                }) => {
                    warn!(run_id = %ctx.run_id, step = %failed, "Merge step failed, rolling back: {}", reason);
                    tx.rollback()
                        .map_err(|e| MergeError::Storage(format!("rollback failed: {}", e)))?;
                    ctx.record_failure(format!("Merge step {} failed: {}", failed, reason));
                    return Ok(MergeOutcome::RolledBack {
                        step: failed,
                        reason,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        tx.commit()
            .map_err(|e| MergeError::Storage(format!("commit failed: {}", e)))?;

        for (step, written) in &rows {
            ctx.note(format!("Merged {} row(s) via {}", written, step));
        }
        info!(run_id = %ctx.run_id, steps = rows.len(), "Merge committed");
        Ok(MergeOutcome::Committed { rows })
    }
}
