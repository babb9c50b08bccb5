//! The detection cycle: evaluate every active rule, dispatch what it raises.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use logwatch_notify::Dispatcher;
use logwatch_rules::{Cycle, CycleReport, RuleEvaluator, RuleSet};

/// One pass over the rule set, run by the scheduler.
///
/// Rules are evaluated in configuration order against a single evaluation
/// time. Each rule's alerts are dispatched before the next rule is
/// evaluated. Cancellation is checked between rules and between alerts; an
/// alert whose dispatch has started always finishes its sink attempts.
pub struct DetectionCycle {
    rules: Arc<RuleSet>,
    evaluator: RuleEvaluator,
    dispatcher: Arc<Dispatcher>,
}

impl DetectionCycle {
    pub fn new(rules: Arc<RuleSet>, evaluator: RuleEvaluator, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            rules,
            evaluator,
            dispatcher,
        }
    }
}

#[async_trait::async_trait]
impl Cycle for DetectionCycle {
    async fn run(&self, cycle: u64, cancel: CancellationToken) -> CycleReport {
        let started = Instant::now();
        let now = RuleEvaluator::evaluation_time(Utc::now());
        let mut report = CycleReport::new(cycle, now);

        let total = self.rules.len();
        'rules: for (idx, rule) in self.rules.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                report.rules_skipped = total - idx;
                info!(cycle, next_rule = %rule.id, "cycle cancelled between rules");
                break;
            }

            let alerts = match self.evaluator.evaluate(rule, now).await {
                Ok(alerts) => alerts,
                Err(e) => {
                    report.rules_failed += 1;
                    warn!(
                        cycle,
                        rule_id = %rule.id,
                        error = %e,
                        transient = e.is_transient(),
                        "rule evaluation failed, continuing with next rule"
                    );
                    continue;
                }
            };
            report.rules_evaluated += 1;
            report.alerts_raised += alerts.len();

            for (sent, alert) in alerts.iter().enumerate() {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    report.rules_skipped = total - idx - 1;
                    info!(
                        cycle,
                        rule_id = %rule.id,
                        undelivered = alerts.len() - sent,
                        "cycle cancelled between alerts"
                    );
                    break 'rules;
                }
                for outcome in self.dispatcher.dispatch(alert).await {
                    if outcome.is_delivered() {
                        report.deliveries_ok += 1;
                    } else {
                        report.deliveries_failed += 1;
                    }
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }
}
