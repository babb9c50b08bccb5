//! Rule definitions as they appear in the configuration file.
//!
//! These are deliberately loose: `kind` is a plain string and the numeric
//! fields are signed so that a bad rule still deserializes. The rules crate
//! turns each definition into an active rule or a warning, which keeps one
//! broken rule from failing the whole configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field=value constraints selecting the records a rule counts.
pub type MatchFilter = IndexMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub kind: String,
    #[serde(default)]
    pub window_minutes: i64,
    #[serde(default)]
    pub threshold: i64,
    #[serde(default = "default_group_by")]
    pub group_by_field: String,
    #[serde(default)]
    pub match_filter: MatchFilter,
    #[serde(default)]
    pub description: Option<String>,
}

pub(crate) fn default_true() -> bool {
    true
}

fn default_group_by() -> String {
    "source_ip".to_string()
}
