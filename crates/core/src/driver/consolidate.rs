use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::debug;

use super::{ItemAudit, JobOutcome, OverallItemStatus, RunContext};
use crate::job::{JobKind, JobStatus};
use crate::staging::StatusRecord;

/// Per-item statuses plus job tallies derived from the status buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Consolidation {
    pub items: Vec<ItemAudit>,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs whose latest record is still `SUBMITTED`.
    pub unsettled: usize,
}

/// Combine the row-history and metadata statuses of one item.
///
/// A kind the item does not track is `None`. An item tracking nothing yields
/// `PartialSuccess`; such items launch no jobs and never reach here from a run.
pub fn overall_item_status(rh: Option<JobStatus>, md: Option<JobStatus>) -> OverallItemStatus {
    let failed = |s: Option<JobStatus>| s.map(|s| s.is_failure()).unwrap_or(false);
    let settled_ok = |s: Option<JobStatus>| matches!(s, None | Some(JobStatus::Success));

    if failed(rh) || failed(md) {
        OverallItemStatus::Failed
    } else if settled_ok(rh) && settled_ok(md) {
        if rh == Some(JobStatus::Success) && md == Some(JobStatus::Success) {
            OverallItemStatus::Success
        } else {
            OverallItemStatus::PartialSuccess
        }
    } else {
        OverallItemStatus::MixedStatus
    }
}

/// Groups status records by item and computes each item's overall status.
pub struct StatusConsolidator;

impl StatusConsolidator {
    /// Pure consolidation over a set of status records.
    ///
    /// The effective record of each (item, kind) is the latest terminal one;
    /// a job with only a provisional `SUBMITTED` record keeps that status.
    pub fn consolidate(records: &[StatusRecord]) -> Consolidation {
        let mut latest: BTreeMap<&str, BTreeMap<JobKind, &StatusRecord>> = BTreeMap::new();
        for record in records {
            let slot = latest
                .entry(record.item_name.as_str())
                .or_default()
                .entry(record.kind);
            match slot {
                Entry::Vacant(v) => {
                    v.insert(record);
                }
                Entry::Occupied(mut o) => {
                    if supersedes(record, o.get()) {
                        o.insert(record);
                    }
                }
            }
        }

        let mut consolidation = Consolidation::default();
        for (item_name, kinds) in latest {
            let mut jobs = BTreeMap::new();
            for (kind, record) in kinds {
                match record.status {
                    JobStatus::Success => consolidation.succeeded += 1,
                    JobStatus::Submitted => consolidation.unsettled += 1,
                    _ => consolidation.failed += 1,
                }
                jobs.insert(
                    kind,
                    JobOutcome {
                        status: record.status,
                        message: record.message.clone(),
                    },
                );
            }

            let status_of = |kind: JobKind| jobs.get(&kind).map(|outcome| outcome.status);
            let overall =
                overall_item_status(status_of(JobKind::RowHistory), status_of(JobKind::Metadata));
            consolidation.items.push(ItemAudit {
                item_name: item_name.to_string(),
                jobs,
                overall_item_status: overall,
            });
        }
        consolidation
    }

    /// Consolidate and fold the result into the run context.
    pub fn apply(records: &[StatusRecord], ctx: &mut RunContext) {
        let consolidation = Self::consolidate(records);

        ctx.counters.jobs_succeeded = consolidation.succeeded;
        ctx.counters.jobs_failed = consolidation.failed;

        if consolidation.failed > 0 {
            ctx.record_failure(format!("{} job(s) failed", consolidation.failed));
        }
        if consolidation.unsettled > 0 {
            ctx.record_failure(format!(
                "{} job(s) never reached a terminal status",
                consolidation.unsettled
            ));
        }
        ctx.note(format!(
            "Consolidated {} item(s): {} job(s) succeeded, {} failed",
            consolidation.items.len(),
            consolidation.succeeded,
            consolidation.failed
        ));
        debug!(run_id = %ctx.run_id, items = consolidation.items.len(), "Consolidated statuses");

        ctx.item_audits = consolidation.items;
    }
}

/// Terminal records outrank provisional ones; otherwise the later record wins.
fn supersedes(candidate: &StatusRecord, current: &StatusRecord) -> bool {
    match (candidate.status.is_terminal(), current.status.is_terminal()) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate.seq > current.seq,
    }
}
