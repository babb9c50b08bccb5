use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record identifier assigned by the log store.
pub type RecordId = String;

/// A structured log record as written by ingestion.
///
/// Only `timestamp` is mandatory; the remaining fields depend on the
/// `log_type` (auth logs carry `event_type`, access logs carry `status_code`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Field names queryable in the log index.
pub const LOG_SCHEMA_FIELDS: &[&str] = &[
    "timestamp",
    "log_type",
    "source_ip",
    "event_type",
    "status_code",
    "method",
    "path",
    "user",
    "host",
    "message",
];

/// Name of the time field used for window range filters.
pub const TIMESTAMP_FIELD: &str = "timestamp";

pub fn is_schema_field(name: &str) -> bool {
    LOG_SCHEMA_FIELDS.contains(&name)
}
