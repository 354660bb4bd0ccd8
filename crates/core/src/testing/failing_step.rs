//! Merge step that always fails.

use rusqlite::Transaction;

use crate::driver::{MergeError, MergeStep};
use crate::staging::StagedRun;

/// How a [`FailingMergeStep`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Ordinary step failure; the run rolls back as `FAILED_OVERALL`.
    Step,
    /// Storage breakage; the run aborts as `CRITICAL_FAILURE`.
    Storage,
}

pub struct FailingMergeStep {
    name: String,
    mode: FailureMode,
}

impl FailingMergeStep {
    pub fn new(name: impl Into<String>, mode: FailureMode) -> Self {
        Self {
            name: name.into(),
            mode,
        }
    }
}

impl MergeStep for FailingMergeStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn merge(&self, _tx: &Transaction<'_>, _staged: &StagedRun) -> Result<usize, MergeError> {
        match self.mode {
            FailureMode::Step => Err(MergeError::Step {
                step: self.name.clone(),
                reason: "scripted step failure".to_string(),
            }),
            FailureMode::Storage => Err(MergeError::Storage(
                "scripted storage failure".to_string(),
            )),
        }
    }
}
