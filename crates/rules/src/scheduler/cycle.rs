//! The unit of work the scheduler runs, and what it reports back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One detection pass over every active rule.
///
/// Implementations check `cancel` between rules and between alerts, and return
/// early once it is triggered, marking the report as cancelled.
#[async_trait::async_trait]
pub trait Cycle: Send + Sync {
    async fn run(&self, cycle: u64, cancel: CancellationToken) -> CycleReport;
}

/// Outcome counters for a single cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub rules_evaluated: usize,
    pub rules_failed: usize,
    /// Rules not reached because the cycle was cancelled.
    pub rules_skipped: usize,
    pub alerts_raised: usize,
    pub deliveries_ok: usize,
    pub deliveries_failed: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn new(cycle: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            started_at,
            rules_evaluated: 0,
            rules_failed: 0,
            rules_skipped: 0,
            alerts_raised: 0,
            deliveries_ok: 0,
            deliveries_failed: 0,
            cancelled: false,
            duration_ms: 0,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.rules_failed > 0 || self.deliveries_failed > 0
    }

    /// Emit the report as one structured log line.
    pub fn log(&self) {
        if self.has_failures() || self.cancelled {
            warn!(
                cycle = self.cycle,
                rules_evaluated = self.rules_evaluated,
                rules_failed = self.rules_failed,
                rules_skipped = self.rules_skipped,
                alerts = self.alerts_raised,
                delivered = self.deliveries_ok,
                delivery_failures = self.deliveries_failed,
                cancelled = self.cancelled,
                duration_ms = self.duration_ms,
                "detection cycle finished with problems"
            );
        } else {
            info!(
                cycle = self.cycle,
                rules_evaluated = self.rules_evaluated,
                alerts = self.alerts_raised,
                delivered = self.deliveries_ok,
                duration_ms = self.duration_ms,
                "detection cycle finished"
            );
        }
    }
}
