use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::driver::DriverResult;

/// Envelope wrapping a finished run with metadata
#[derive(Debug, Clone)]
pub struct AuditEnvelope {
    pub recorded_at: DateTime<Utc>,
    pub config_hash: Option<String>,
    pub result: DriverResult,
}

/// Handle for emitting finished runs to the audit writer
///
/// This is cheaply cloneable and can be shared across tasks.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEnvelope>,
    config_hash: Option<String>,
}

impl AuditHandle {
    /// Create a new audit handle from a channel sender
    pub fn new(tx: mpsc::Sender<AuditEnvelope>) -> Self {
        Self {
            tx,
            config_hash: None,
        }
    }

    /// Stamp every emitted record with this configuration fingerprint.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    fn envelope(&self, result: DriverResult) -> AuditEnvelope {
        AuditEnvelope {
            recorded_at: Utc::now(),
            config_hash: self.config_hash.clone(),
            result,
        }
    }

    /// Emit a run result
    ///
    /// If the channel is closed, the error is logged but the caller is not failed.
    pub async fn emit(&self, result: DriverResult) {
        if let Err(e) = self.tx.send(self.envelope(result)).await {
            tracing::error!("Failed to emit audit record: {}", e);
        }
    }

    /// Try to emit a run result without waiting for channel capacity
    ///
    /// Returns true if the record was queued.
    pub fn try_emit(&self, result: DriverResult) -> bool {
        match self.tx.try_send(self.envelope(result)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit audit record: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_emit_carries_config_hash() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx).with_config_hash("abc123");

        handle.emit(fixtures::driver_result_success()).await;

        let envelope = rx.recv().await.expect("Should receive record");
        assert_eq!(envelope.config_hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_try_emit_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = AuditHandle::new(tx);

        assert!(handle.try_emit(fixtures::driver_result_success()));
        // Channel full
        assert!(!handle.try_emit(fixtures::driver_result_success()));
    }

    #[tokio::test]
    async fn test_emit_closed_channel() {
        let (tx, rx) = mpsc::channel::<AuditEnvelope>(10);
        let handle = AuditHandle::new(tx);
        drop(rx);

        // Should not panic, just log an error
        handle.emit(fixtures::driver_result_success()).await;
    }

    #[test]
    fn test_envelope_has_timestamp() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = AuditHandle::new(tx);

        let before = Utc::now();
        handle.try_emit(fixtures::driver_result_success());
        let after = Utc::now();

        let envelope = rx.try_recv().expect("Should receive record");
        assert!(envelope.recorded_at >= before);
        assert!(envelope.recorded_at <= after);
        assert!(envelope.config_hash.is_none());
    }
}
