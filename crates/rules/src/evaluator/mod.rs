//! Rule evaluation against the query adapter.
//!
//! Each rule kind maps to a [`DetectionStrategy`]; today every kind uses the
//! grouped-threshold strategy: count matching records per group over the
//! trailing window and raise one alert per group at or above the threshold.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, info_span, Instrument};

use logwatch_core::{AlertEvent, TimeWindow};

use crate::query::{AggregateQuery, GroupCounts, LogQuery, QueryError};
use crate::schema::{ActiveRule, DetectionStrategy};

/// Default evidence record ids attached to each alert.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// Evaluates active rules through a [`LogQuery`] adapter.
///
/// Holds no state between calls: the same store contents and evaluation
/// time always produce the same alerts.
pub struct RuleEvaluator {
    query: Arc<dyn LogQuery>,
    query_timeout: Duration,
    sample_size: usize,
}

impl RuleEvaluator {
    pub fn new(query: Arc<dyn LogQuery>, query_timeout: Duration) -> Self {
        Self {
            query,
            query_timeout,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Normalize a cycle's evaluation time so every rule in the cycle shares
    /// identical window bounds.
    pub fn evaluation_time(now: DateTime<Utc>) -> DateTime<Utc> {
        now.trunc_subsecs(0)
    }

    /// Evaluate one rule at `now`.
    ///
    /// Returns the alerts raised by this rule, ordered by descending count then
    /// group key. A query failure is returned to the caller, which records it
    /// and moves on to the next rule.
    pub async fn evaluate(
        &self,
        rule: &ActiveRule,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertEvent>, QueryError> {
        let window = TimeWindow::trailing(now, rule.window_minutes)?;

        let start = Instant::now();
        let alerts = match rule.kind.strategy() {
            DetectionStrategy::GroupedThreshold => {
                self.grouped_threshold(rule, window, now).await?
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        if alerts.is_empty() {
            debug!(rule_id = %rule.id, duration_ms, "rule evaluated, no matches");
        } else {
            info!(
                rule_id = %rule.id,
                alerts = alerts.len(),
                duration_ms,
                "rule matched"
            );
        }
        Ok(alerts)
    }

    async fn grouped_threshold(
        &self,
        rule: &ActiveRule,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertEvent>, QueryError> {
        let query = AggregateQuery {
            filter: rule.match_filter.clone(),
            group_by: rule.group_by_field.clone(),
            window,
            sample_size: self.sample_size,
        };

        // Adapter logs (e.g. a truncated aggregation) carry the rule id.
        let span = info_span!("rule_query", rule_id = %rule.id);
        let counts = match tokio::time::timeout(
            self.query_timeout,
            self.query.aggregate(&query).instrument(span),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(QueryError::QueryTimeout(self.query_timeout)),
        };

        Ok(alerts_over_threshold(rule, &window, now, counts))
    }
}

/// Build one alert per group whose count reaches the rule's threshold.
pub fn alerts_over_threshold(
    rule: &ActiveRule,
    window: &TimeWindow,
    detected_at: DateTime<Utc>,
    counts: GroupCounts,
) -> Vec<AlertEvent> {
    let mut alerts: Vec<AlertEvent> = counts
        .into_iter()
        .filter(|(_, bucket)| bucket.count >= rule.threshold)
        .map(|(group_key, bucket)| AlertEvent {
            alert_id: AlertEvent::compute_id(&rule.id, &group_key, window),
            rule_id: rule.id.clone(),
            rule_kind: rule.kind.to_string(),
            detected_at,
            window_start: window.start,
            window_end: window.end,
            group_by: rule.group_by_field.clone(),
            summary: rule.kind.summary(
                &rule.group_by_field,
                &group_key,
                bucket.count,
                rule.threshold,
                rule.window_minutes,
            ),
            group_key,
            count: bucket.count,
            threshold: rule.threshold,
            severity: rule.kind.severity(),
            raw_sample_refs: bucket.sample_refs,
        })
        .collect();

    alerts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.group_key.cmp(&b.group_key)));
    alerts
}
