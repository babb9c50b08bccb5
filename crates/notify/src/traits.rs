//! Sink trait definition and shared error types.

use std::time::Duration;

use chrono::{SubsecRound, Utc};
use logwatch_core::{AlertEvent, Severity, TimeWindow};

/// Errors that can occur during alert delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("alert store write failed: {0}")]
    Store(String),
}

/// A delivery target for alert events.
///
/// Sinks never retry internally; a failed delivery is recorded by the
/// dispatcher and the next cycle produces a fresh alert if the condition
/// persists.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert.
    async fn deliver(&self, alert: &AlertEvent) -> Result<(), NotifyError>;

    /// Check the sink end to end by delivering a synthetic alert.
    async fn probe(&self) -> Result<(), NotifyError> {
        self.deliver(&probe_alert()).await
    }

    /// Stable name used in dispatch outcomes and logs (e.g. "file", "webhook").
    fn sink_name(&self) -> &str;
}

/// Synthetic alert used by [`AlertSink::probe`].
pub fn probe_alert() -> AlertEvent {
    let now = Utc::now().trunc_subsecs(0);
    let window = TimeWindow {
        start: now - chrono::Duration::minutes(1),
        end: now,
    };
    AlertEvent {
        alert_id: AlertEvent::compute_id("logwatch-probe", "probe", &window),
        rule_id: "logwatch-probe".to_string(),
        rule_kind: "probe".to_string(),
        detected_at: now,
        window_start: window.start,
        window_end: window.end,
        group_by: "host".to_string(),
        group_key: "probe".to_string(),
        count: 0,
        threshold: 0,
        severity: Severity::Low,
        summary: "[TEST] logwatch sink probe".to_string(),
        raw_sample_refs: Vec::new(),
    }
}
