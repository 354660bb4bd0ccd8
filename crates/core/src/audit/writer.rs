use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AuditEnvelope, AuditHandle, AuditRecord, AuditStore};
use crate::driver::DriverStatus;

/// Background task that persists finished runs and raises alerts for failed ones
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    /// Create a new audit writer
    pub fn new(rx: mpsc::Receiver<AuditEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Run the writer, consuming records until the channel is closed
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!("Audit writer started");

        while let Some(envelope) = self.rx.recv().await {
            let mut record = AuditRecord::new(envelope.result, envelope.config_hash);
            record.recorded_at = envelope.recorded_at;

            alert(&record);

            if let Err(e) = self.store.append(&record) {
                tracing::error!(run_id = %record.run_id, "Failed to write audit record: {}", e);
            }
        }

        tracing::info!("Audit writer shutting down");
    }
}

fn alert(record: &AuditRecord) {
    let result = &record.result;
    match record.status {
        DriverStatus::Success => {}
        DriverStatus::FailedOverall => tracing::warn!(
            run_id = %record.run_id,
            failed = result.total_jobs_failed,
            launched = result.total_jobs_launched,
            "ALERT: driver run failed, nothing committed"
        ),
        DriverStatus::CriticalFailure => tracing::error!(
            run_id = %record.run_id,
            message = %result.message,
            "ALERT: driver run hit a critical failure"
        ),
    }
}

/// Create a complete audit system
///
/// Returns:
/// - `AuditHandle` - for emitting results (clone this to share across tasks)
/// - `AuditWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = AuditHandle::new(tx);
    let writer = AuditWriter::new(rx, store);
    (handle, writer)
}
