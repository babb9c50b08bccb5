//! Rule-set construction from configured rule definitions.
//!
//! Every enabled definition either becomes an [`ActiveRule`] or produces a
//! [`RuleConfigWarning`]. Warnings never abort loading: a rule with an unknown
//! kind or a zero threshold is left out and the rest still run.

mod rule_checks;

use logwatch_core::RuleDefinition;
use tracing::{info, warn};

use crate::schema::ActiveRule;

use rule_checks::check_definition;

/// A recoverable, per-rule configuration problem. The rule is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleConfigWarning {
    #[error("rule '{rule_id}': unknown kind '{kind}'")]
    UnknownKind { rule_id: String, kind: String },

    #[error("rule '{rule_id}': threshold must be positive, got {threshold}")]
    NonPositiveThreshold { rule_id: String, threshold: i64 },

    #[error("rule '{rule_id}': window_minutes must be positive, got {window_minutes}")]
    NonPositiveWindow { rule_id: String, window_minutes: i64 },

    #[error("rule '{rule_id}': window_minutes {window_minutes} exceeds the maximum of {max}")]
    WindowOutOfRange {
        rule_id: String,
        window_minutes: i64,
        max: i64,
    },

    #[error("rule '{rule_id}': field '{field}' is not part of the log schema")]
    UnknownField { rule_id: String, field: String },

    #[error("rule '{rule_id}': match_filter value for '{field}' must be a string, number, or bool")]
    NonScalarFilter { rule_id: String, field: String },
}

impl RuleConfigWarning {
    pub fn rule_id(&self) -> &str {
        match self {
            RuleConfigWarning::UnknownKind { rule_id, .. }
            | RuleConfigWarning::NonPositiveThreshold { rule_id, .. }
            | RuleConfigWarning::NonPositiveWindow { rule_id, .. }
            | RuleConfigWarning::WindowOutOfRange { rule_id, .. }
            | RuleConfigWarning::UnknownField { rule_id, .. }
            | RuleConfigWarning::NonScalarFilter { rule_id, .. } => rule_id,
        }
    }
}

/// The immutable set of rules evaluated each cycle, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ActiveRule>,
    disabled: usize,
}

impl RuleSet {
    /// Build the active set, collecting a warning for each rejected rule.
    ///
    /// Disabled rules are counted but not validated.
    pub fn from_definitions(defs: &[RuleDefinition]) -> (Self, Vec<RuleConfigWarning>) {
        let mut set = RuleSet::default();
        let mut warnings = Vec::new();

        for def in defs {
            if !def.enabled {
                set.disabled += 1;
                continue;
            }
            match check_definition(def) {
                Ok(rule) => set.rules.push(rule),
                Err(warning) => warnings.push(warning),
            }
        }

        (set, warnings)
    }

    /// Same as [`from_definitions`](Self::from_definitions), logging each warning.
    pub fn load(defs: &[RuleDefinition]) -> Self {
        let (set, warnings) = Self::from_definitions(defs);
        for warning in &warnings {
            warn!(rule_id = %warning.rule_id(), warning = %warning, "rule skipped");
        }
        info!(
            active = set.len(),
            disabled = set.disabled,
            skipped = warnings.len(),
            "rule set loaded"
        );
        set
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveRule> {
        self.rules.iter()
    }

    pub fn get(&self, rule_id: &str) -> Option<&ActiveRule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn disabled_count(&self) -> usize {
        self.disabled
    }
}
