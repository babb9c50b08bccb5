//! Rule kind enum and the fixed kind → severity / strategy tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use logwatch_core::rule::MatchFilter;
use logwatch_core::Severity;

/// Supported detection rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Repeated failed logins from one group key.
    FailedLoginThreshold,
    /// Elevated HTTP error (404) responses for one group key.
    HighErrorRate,
}

/// How a rule kind turns store data into alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStrategy {
    /// Count matching records per group within the window; alert on `count >= threshold`.
    GroupedThreshold,
}

impl RuleKind {
    pub fn severity(&self) -> Severity {
        match self {
            RuleKind::FailedLoginThreshold => Severity::High,
            RuleKind::HighErrorRate => Severity::Medium,
        }
    }

    pub fn strategy(&self) -> DetectionStrategy {
        match self {
            RuleKind::FailedLoginThreshold | RuleKind::HighErrorRate => {
                DetectionStrategy::GroupedThreshold
            }
        }
    }

    /// Filter used when a rule leaves `match_filter` empty.
    pub fn default_filter(&self) -> MatchFilter {
        let mut filter = MatchFilter::new();
        match self {
            RuleKind::FailedLoginThreshold => {
                filter.insert("event_type".to_string(), "failed_login".into());
            }
            RuleKind::HighErrorRate => {
                filter.insert("status_code".to_string(), 404.into());
            }
        }
        filter
    }

    /// Human-readable alert summary for one matching group.
    pub fn summary(
        &self,
        group_by: &str,
        group_key: &str,
        count: u64,
        threshold: u64,
        window_minutes: i64,
    ) -> String {
        let what = match self {
            RuleKind::FailedLoginThreshold => "failed login attempts",
            RuleKind::HighErrorRate => "HTTP error responses",
        };
        format!(
            "{count} {what} from {group_by} {group_key} in the last {window_minutes} minutes (threshold {threshold})"
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::FailedLoginThreshold => "failed_login_threshold",
            RuleKind::HighErrorRate => "high_error_rate",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "failed_login_threshold" => Ok(RuleKind::FailedLoginThreshold),
            "high_error_rate" => Ok(RuleKind::HighErrorRate),
            other => Err(format!("unknown rule kind: '{}'", other)),
        }
    }
}
