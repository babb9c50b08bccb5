//! Alert events and per-sink dispatch outcomes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::window::TimeWindow;

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: '{}'", other)),
        }
    }
}

/// A single rule match for one group key within one evaluation window.
///
/// Created by the evaluator and never mutated afterwards; sinks only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Deterministic identifier, see [`AlertEvent::compute_id`].
    pub alert_id: String,
    pub rule_id: String,
    pub rule_kind: String,
    pub detected_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Field the records were grouped by (e.g. `source_ip`).
    pub group_by: String,
    /// Value of `group_by` that crossed the threshold.
    pub group_key: String,
    pub count: u64,
    pub threshold: u64,
    pub severity: Severity,
    pub summary: String,
    /// Identifiers of a few underlying log records, as evidence.
    #[serde(default)]
    pub raw_sample_refs: Vec<String>,
}

impl AlertEvent {
    /// Identifier derived from `(rule, group_key, window)`.
    ///
    /// Two alerts for the same key in the same window always share an id, which
    /// lets create-only stores reject a replay instead of duplicating it.
    pub fn compute_id(rule_id: &str, group_key: &str, window: &TimeWindow) -> String {
        let mut hasher = Sha256::new();
        hasher.update(rule_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(group_key.as_bytes());
        hasher.update([0u8]);
        hasher.update(window.start.timestamp_millis().to_be_bytes());
        hasher.update(window.end.timestamp_millis().to_be_bytes());
        let digest = hasher.finalize();
        digest[..16].iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.window_start,
            end: self.window_end,
        }
    }
}

/// Delivery result for one sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

/// Outcome of delivering one alert to one sink.
///
/// `error_detail` is set exactly when `status` is [`DeliveryStatus::Failed`];
/// use the constructors to keep that true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub sink_name: String,
    pub alert_id: String,
    pub status: DeliveryStatus,
    pub error_detail: Option<String>,
    pub attempted_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl DispatchOutcome {
    pub fn delivered(
        sink_name: impl Into<String>,
        alert_id: impl Into<String>,
        attempted_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            sink_name: sink_name.into(),
            alert_id: alert_id.into(),
            status: DeliveryStatus::Delivered,
            error_detail: None,
            attempted_at,
            duration_ms,
        }
    }

    pub fn failed(
        sink_name: impl Into<String>,
        alert_id: impl Into<String>,
        attempted_at: DateTime<Utc>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            sink_name: sink_name.into(),
            alert_id: alert_id.into(),
            status: DeliveryStatus::Failed,
            error_detail: Some(error.into()),
            attempted_at,
            duration_ms,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}
