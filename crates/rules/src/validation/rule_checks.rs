//! Per-definition checks: kind, window, threshold, schema fields.

use logwatch_core::{is_schema_field, RuleDefinition, MAX_WINDOW_MINUTES};

use crate::schema::{is_scalar, ActiveRule, RuleKind};

use super::RuleConfigWarning;

/// Validate one enabled definition into an [`ActiveRule`].
///
/// Checks run in order and stop at the first problem.
pub(super) fn check_definition(def: &RuleDefinition) -> Result<ActiveRule, RuleConfigWarning> {
    let kind: RuleKind = def.kind.parse().map_err(|_| RuleConfigWarning::UnknownKind {
        rule_id: def.id.clone(),
        kind: def.kind.clone(),
    })?;

    if def.window_minutes <= 0 {
        return Err(RuleConfigWarning::NonPositiveWindow {
            rule_id: def.id.clone(),
            window_minutes: def.window_minutes,
        });
    }

    if def.window_minutes > MAX_WINDOW_MINUTES {
        return Err(RuleConfigWarning::WindowOutOfRange {
            rule_id: def.id.clone(),
            window_minutes: def.window_minutes,
            max: MAX_WINDOW_MINUTES,
        });
    }

    if def.threshold <= 0 {
        return Err(RuleConfigWarning::NonPositiveThreshold {
            rule_id: def.id.clone(),
            threshold: def.threshold,
        });
    }

    if !is_schema_field(&def.group_by_field) {
        return Err(RuleConfigWarning::UnknownField {
            rule_id: def.id.clone(),
            field: def.group_by_field.clone(),
        });
    }

    for (field, value) in &def.match_filter {
        if !is_schema_field(field) {
            return Err(RuleConfigWarning::UnknownField {
                rule_id: def.id.clone(),
                field: field.clone(),
            });
        }
        if !is_scalar(value) {
            return Err(RuleConfigWarning::NonScalarFilter {
                rule_id: def.id.clone(),
                field: field.clone(),
            });
        }
    }

    let match_filter = if def.match_filter.is_empty() {
        kind.default_filter()
    } else {
        def.match_filter.clone()
    };

    Ok(ActiveRule {
        id: def.id.clone(),
        kind,
        window_minutes: def.window_minutes,
        threshold: def.threshold as u64,
        group_by_field: def.group_by_field.clone(),
        match_filter,
        description: def.description.clone(),
    })
}
