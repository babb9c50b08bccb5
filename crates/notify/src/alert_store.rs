//! Alert-store sink: persists alerts into a dedicated alert index.

use std::sync::Arc;

use logwatch_core::AlertEvent;

use crate::traits::{AlertSink, NotifyError};

/// Result of a create-only alert write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWrite {
    Created,
    /// A document with this alert id already exists; the write is a no-op.
    AlreadyExists,
}

/// Append-only writer for the alert index.
///
/// Implementations must never overwrite an existing alert: writes are keyed
/// by `alert_id` and a second write of the same id reports
/// [`IndexWrite::AlreadyExists`].
#[async_trait::async_trait]
pub trait AlertIndexWriter: Send + Sync {
    async fn index_alert(&self, alert: &AlertEvent) -> Result<IndexWrite, NotifyError>;

    /// Check that the alert index is reachable without writing to it.
    async fn check_writable(&self) -> Result<(), NotifyError>;
}

/// Delivers alerts to an [`AlertIndexWriter`].
pub struct AlertStoreSink {
    writer: Arc<dyn AlertIndexWriter>,
}

impl AlertStoreSink {
    pub fn new(writer: Arc<dyn AlertIndexWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait::async_trait]
impl AlertSink for AlertStoreSink {
    async fn deliver(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
        match self.writer.index_alert(alert).await? {
            IndexWrite::Created => {}
            IndexWrite::AlreadyExists => {
                tracing::debug!(alert_id = %alert.alert_id, "alert already stored");
            }
        }
        Ok(())
    }

    async fn probe(&self) -> Result<(), NotifyError> {
        self.writer.check_writable().await
    }

    fn sink_name(&self) -> &str {
        "alert_store"
    }
}
