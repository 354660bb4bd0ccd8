use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::job::{JobKind, JobStatus};

/// Overall outcome of a driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Success,
    FailedOverall,
    CriticalFailure,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Success => "SUCCESS",
            DriverStatus::FailedOverall => "FAILED_OVERALL",
            DriverStatus::CriticalFailure => "CRITICAL_FAILURE",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DriverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(DriverStatus::Success),
            "FAILED_OVERALL" => Ok(DriverStatus::FailedOverall),
            "CRITICAL_FAILURE" => Ok(DriverStatus::CriticalFailure),
            other => Err(format!("unknown driver status: {}", other)),
        }
    }
}

/// Consolidated status of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallItemStatus {
    Success,
    PartialSuccess,
    Failed,
    MixedStatus,
}

/// Run lifecycle.
///
/// `Init -> Launching -> Awaiting -> Consolidating -> (Merging -> Committed | RolledBack)`
/// or `Consolidating -> Skipped -> RolledBack`. Any non-terminal phase may
/// jump to `CriticalFailure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Init,
    Launching,
    Awaiting,
    Consolidating,
    Merging,
    Committed,
    Skipped,
    RolledBack,
    CriticalFailure,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Committed | RunPhase::RolledBack | RunPhase::CriticalFailure
        )
    }

    pub fn can_advance_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (from, CriticalFailure) => !from.is_terminal(),
            (Init, Launching)
            | (Launching, Awaiting)
            | (Awaiting, Consolidating)
            | (Consolidating, Merging)
            | (Consolidating, Skipped)
            | (Merging, Committed)
            | (Merging, RolledBack)
            | (Skipped, RolledBack) => true,
            _ => false,
        }
    }
}

/// Status and optional failure message of one job, as reported in the audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAudit {
    pub item_name: String,
    pub jobs: BTreeMap<JobKind, JobOutcome>,
    pub overall_item_status: OverallItemStatus,
}

/// Seconds spent in each phase; zero when the phase did not execute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub launch: f64,
    #[serde(rename = "await")]
    pub wait: f64,
    pub merge: f64,
}

/// The structured result returned to the caller and persisted by the audit sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverResult {
    pub status: DriverStatus,
    pub message: String,
    pub run_id: Uuid,
    pub start_time: String,
    pub end_time: String,
    pub time_zone: String,
    pub total_tables_found: usize,
    pub total_jobs_launched: usize,
    pub total_jobs_succeeded: usize,
    pub total_jobs_failed: usize,
    pub item_audit_details: Vec<ItemAudit>,
    pub phase_durations_sec: PhaseDurations,
    pub total_run_duration_sec: f64,
}

/// Counters accumulated while the run progresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub tables_found: usize,
    pub jobs_launched: usize,
    pub submission_failures: usize,
    pub barrier_waits: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
}

/// Mutable state of one run, threaded through every phase.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    pub time_zone: Tz,
    pub started_at: DateTime<Utc>,
    pub any_failure_observed: bool,
    pub counters: RunCounters,
    pub durations: PhaseDurations,
    pub item_audits: Vec<ItemAudit>,
    phase: RunPhase,
    log: Vec<String>,
}

impl RunContext {
    pub fn new(time_zone: Tz) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            time_zone,
            started_at: Utc::now(),
            any_failure_observed: false,
            counters: RunCounters::default(),
            durations: PhaseDurations::default(),
            item_audits: Vec::new(),
            phase: RunPhase::Init,
            log: Vec::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn advance(&mut self, next: RunPhase) {
        if !self.phase.can_advance_to(next) {
            warn!(
                run_id = %self.run_id,
                from = ?self.phase,
                to = ?next,
                "Unexpected phase transition"
            );
        }
        info!(run_id = %self.run_id, phase = ?next, "Run phase");
        self.phase = next;
    }

    /// Append a line to the human-readable phase log.
    pub fn note(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Note a caught failure; the run will not commit.
    pub fn record_failure(&mut self, line: impl Into<String>) {
        self.any_failure_observed = true;
        self.note(line);
    }

    pub fn log_lines(&self) -> &[String] {
        &self.log
    }
}
