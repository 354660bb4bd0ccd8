use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use uuid::Uuid;

use super::{MetadataRow, RowHistoryRow, StagedRun, StagingError, StatusRecord};
use crate::job::{JobKind, JobStatus};

/// The three buffers of a single run.
#[derive(Default)]
struct RunPartition {
    row_history: Mutex<BTreeMap<String, Vec<RowHistoryRow>>>,
    metadata: Mutex<BTreeMap<String, MetadataRow>>,
    statuses: Mutex<BTreeMap<(String, JobKind), Vec<StatusRecord>>>,
    next_seq: AtomicU64,
}

/// Owner of every open run partition.
#[derive(Default)]
pub struct StagingArea {
    partitions: RwLock<HashMap<Uuid, Arc<RunPartition>>>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the partition for `run_id` and return the handle jobs write through.
    pub fn open(&self, run_id: Uuid) -> Result<StagingBuffers, StagingError> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|_| StagingError::Poisoned("partitions"))?;
        if partitions.contains_key(&run_id) {
            return Err(StagingError::RunAlreadyOpen(run_id));
        }
        let partition = Arc::new(RunPartition::default());
        partitions.insert(run_id, Arc::clone(&partition));
        Ok(StagingBuffers { run_id, partition })
    }

    /// Drop the partition. Returns false if it was not open.
    pub fn discard(&self, run_id: Uuid) -> bool {
        match self.partitions.write() {
            Ok(mut partitions) => partitions.remove(&run_id).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(&run_id).is_some(),
        }
    }

    pub fn open_runs(&self) -> usize {
        self.partitions.read().map(|p| p.len()).unwrap_or(0)
    }
}

/// Handle to one run's buffers. Cloned into every job of that run.
#[derive(Clone)]
pub struct StagingBuffers {
    run_id: Uuid,
    partition: Arc<RunPartition>,
}

impl std::fmt::Debug for StagingBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingBuffers")
            .field("run_id", &self.run_id)
            .finish()
    }
}

impl StagingBuffers {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append a status record, returning its sequence number.
    pub fn record_status(
        &self,
        item_name: &str,
        kind: JobKind,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<u64, StagingError> {
        let mut statuses = self
            .partition
            .statuses
            .lock()
            .map_err(|_| StagingError::Poisoned("status"))?;
        let seq = self.partition.next_seq.fetch_add(1, Ordering::SeqCst);
        statuses
            .entry((item_name.to_string(), kind))
            .or_default()
            .push(StatusRecord {
                seq,
                item_name: item_name.to_string(),
                kind,
                status,
                message,
                recorded_at: Utc::now(),
            });
        Ok(seq)
    }

    /// Append row-history output under the item's own key.
    pub fn append_row_history(
        &self,
        item_name: &str,
        rows: Vec<RowHistoryRow>,
    ) -> Result<(), StagingError> {
        if let Some(stray) = rows.iter().find(|row| row.item_name != item_name) {
            return Err(StagingError::KeyMismatch {
                expected: item_name.to_string(),
                found: stray.item_name.clone(),
            });
        }
        let mut buffer = self
            .partition
            .row_history
            .lock()
            .map_err(|_| StagingError::Poisoned("row_history"))?;
        buffer.entry(item_name.to_string()).or_default().extend(rows);
        Ok(())
    }

    /// Stage the metadata snapshot for one item.
    pub fn put_metadata(&self, row: MetadataRow) -> Result<(), StagingError> {
        let mut buffer = self
            .partition
            .metadata
            .lock()
            .map_err(|_| StagingError::Poisoned("metadata"))?;
        buffer.insert(row.item_name.clone(), row);
        Ok(())
    }

    /// Every status record of the run, in recording order.
    pub fn statuses(&self) -> Result<Vec<StatusRecord>, StagingError> {
        let statuses = self
            .partition
            .statuses
            .lock()
            .map_err(|_| StagingError::Poisoned("status"))?;
        let mut records: Vec<StatusRecord> = statuses.values().flatten().cloned().collect();
        records.sort_by_key(|record| record.seq);
        Ok(records)
    }

    /// Status records written under one job's key.
    pub fn job_statuses(
        &self,
        item_name: &str,
        kind: JobKind,
    ) -> Result<Vec<StatusRecord>, StagingError> {
        let statuses = self
            .partition
            .statuses
            .lock()
            .map_err(|_| StagingError::Poisoned("status"))?;
        Ok(statuses
            .get(&(item_name.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    /// Copy out all three buffers.
    pub fn snapshot(&self) -> Result<StagedRun, StagingError> {
        let row_history = self
            .partition
            .row_history
            .lock()
            .map_err(|_| StagingError::Poisoned("row_history"))?
            .values()
            .flatten()
            .cloned()
            .collect();
        let metadata = self
            .partition
            .metadata
            .lock()
            .map_err(|_| StagingError::Poisoned("metadata"))?
            .values()
            .cloned()
            .collect();

        Ok(StagedRun {
            run_id: self.run_id,
            row_history,
            metadata,
            statuses: self.statuses()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(item: &str, count: i64) -> RowHistoryRow {
        RowHistoryRow {
            item_name: item.to_string(),
            snapshot_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            row_count: count,
            window_days: 1,
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn test_partitions_are_isolated() {
        let area = StagingArea::new();
        let a = area.open(Uuid::new_v4()).unwrap();
        let b = area.open(Uuid::new_v4()).unwrap();

        a.append_row_history("main.orders", vec![row("main.orders", 10)])
            .unwrap();
        a.record_status("main.orders", JobKind::RowHistory, JobStatus::Success, None)
            .unwrap();

        let staged_b = b.snapshot().unwrap();
        assert!(staged_b.row_history.is_empty());
        assert!(staged_b.statuses.is_empty());

        let staged_a = a.snapshot().unwrap();
        assert_eq!(staged_a.run_id, a.run_id());
        assert_eq!(staged_a.row_history.len(), 1);
        assert_eq!(area.open_runs(), 2);
    }

    #[test]
    fn test_open_twice_rejected() {
        let area = StagingArea::new();
        let run_id = Uuid::new_v4();
        area.open(run_id).unwrap();
        assert!(matches!(
            area.open(run_id),
            Err(StagingError::RunAlreadyOpen(id)) if id == run_id
        ));
    }

    #[test]
    fn test_discard_removes_partition() {
        let area = StagingArea::new();
        let run_id = Uuid::new_v4();
        area.open(run_id).unwrap();
        assert!(area.discard(run_id));
        assert!(!area.discard(run_id));
        assert_eq!(area.open_runs(), 0);
    }

    #[test]
    fn test_status_sequence_is_monotonic() {
        let area = StagingArea::new();
        let buffers = area.open(Uuid::new_v4()).unwrap();
        let first = buffers
            .record_status("main.a", JobKind::Metadata, JobStatus::Submitted, None)
            .unwrap();
        let second = buffers
            .record_status(
                "main.a",
                JobKind::Metadata,
                JobStatus::FailedInput,
                Some("no such table".to_string()),
            )
            .unwrap();
        assert!(second > first);

        let statuses = buffers.statuses().unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[1].message.as_deref(), Some("no such table"));
    }

    #[test]
    fn test_statuses_keyed_per_job() {
        let area = StagingArea::new();
        let buffers = area.open(Uuid::new_v4()).unwrap();
        buffers
            .record_status("main.b", JobKind::RowHistory, JobStatus::Submitted, None)
            .unwrap();
        buffers
            .record_status("main.a", JobKind::Metadata, JobStatus::Submitted, None)
            .unwrap();
        buffers
            .record_status("main.b", JobKind::RowHistory, JobStatus::Success, None)
            .unwrap();

        let own = buffers
            .job_statuses("main.b", JobKind::RowHistory)
            .unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|r| r.item_name == "main.b"));
        assert!(buffers
            .job_statuses("main.b", JobKind::Metadata)
            .unwrap()
            .is_empty());

        let all = buffers.statuses().unwrap();
        let seqs: Vec<u64> = all.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(all[1].item_name, "main.a");
    }

    #[test]
    fn test_row_for_other_item_rejected() {
        let area = StagingArea::new();
        let buffers = area.open(Uuid::new_v4()).unwrap();
        let err = buffers
            .append_row_history("main.orders", vec![row("main.users", 1)])
            .unwrap_err();
        assert!(matches!(err, StagingError::KeyMismatch { .. }));
        assert!(buffers.snapshot().unwrap().row_history.is_empty());
    }

    #[test]
    fn test_row_history_appends_under_same_key() {
        let area = StagingArea::new();
        let buffers = area.open(Uuid::new_v4()).unwrap();
        buffers
            .append_row_history("main.orders", vec![row("main.orders", 1)])
            .unwrap();
        buffers
            .append_row_history("main.orders", vec![row("main.orders", 2)])
            .unwrap();
        assert_eq!(buffers.snapshot().unwrap().row_history.len(), 2);
    }
}
