//! Job kinds and statuses shared by the launcher, executor and consolidator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Collection job kinds. Each maps to one capability flag on a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    /// Periodic row-count history.
    RowHistory,
    /// Column-level schema snapshot.
    Metadata,
}

impl JobKind {
    /// Launch order within one work item.
    pub const ALL: [JobKind; 2] = [JobKind::RowHistory, JobKind::Metadata];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::RowHistory => "ROW_HISTORY",
            JobKind::Metadata => "METADATA",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one job as recorded in the status buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Provisional, written by the launcher after a successful submit.
    Submitted,
    Success,
    FailedSubmission,
    FailedExecution,
    FailedInput,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Success => "SUCCESS",
            JobStatus::FailedSubmission => "FAILED_SUBMISSION",
            JobStatus::FailedExecution => "FAILED_EXECUTION",
            JobStatus::FailedInput => "FAILED_INPUT",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::FailedSubmission | JobStatus::FailedExecution | JobStatus::FailedInput
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Submitted)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(JobStatus::Submitted),
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILED_SUBMISSION" => Ok(JobStatus::FailedSubmission),
            "FAILED_EXECUTION" => Ok(JobStatus::FailedExecution),
            "FAILED_INPUT" => Ok(JobStatus::FailedInput),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}
