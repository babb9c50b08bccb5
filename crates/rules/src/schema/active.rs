//! Validated rules.

use logwatch_core::rule::MatchFilter;

use super::RuleKind;

/// An enabled rule whose kind is known and whose window and threshold are
/// positive. Only [`crate::validation::RuleSet`] constructs these.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRule {
    pub id: String,
    pub kind: RuleKind,
    pub window_minutes: i64,
    pub threshold: u64,
    pub group_by_field: String,
    /// Effective filter: the configured one, or the kind's default when empty.
    pub match_filter: MatchFilter,
    pub description: Option<String>,
}
