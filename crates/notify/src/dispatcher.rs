//! Fans alerts out to every enabled sink.
//!
//! Each sink is attempted independently and bounded by its own timeout, so
//! one slow or failing sink never blocks or hides the others. Every attempt
//! produces exactly one [`DispatchOutcome`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use logwatch_core::{AlertEvent, DispatchOutcome};

use crate::traits::{AlertSink, NotifyError};

struct RegisteredSink {
    sink: Arc<dyn AlertSink>,
    timeout: Duration,
}

/// Delivers alerts to an ordered list of sinks.
#[derive(Default)]
pub struct Dispatcher {
    sinks: Vec<RegisteredSink>,
}

impl Dispatcher {
    /// Create a dispatcher with no sinks. Dispatching through it is legal and
    /// returns no outcomes.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink whose deliveries are bounded by `timeout`.
    pub fn register(&mut self, sink: Arc<dyn AlertSink>, timeout: Duration) {
        self.sinks.push(RegisteredSink { sink, timeout });
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>, timeout: Duration) -> Self {
        self.register(sink, timeout);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.sink.sink_name()).collect()
    }

    /// Deliver one alert to every sink.
    ///
    /// Attempts run concurrently; outcomes come back in registration order,
    /// one per sink, whether delivered or failed.
    pub async fn dispatch(&self, alert: &AlertEvent) -> Vec<DispatchOutcome> {
        if self.sinks.is_empty() {
            tracing::debug!(alert_id = %alert.alert_id, rule_id = %alert.rule_id, "no sinks enabled, alert dropped");
            return Vec::new();
        }

        join_all(self.sinks.iter().map(|slot| deliver_one(slot, alert))).await
    }

    /// Probe every sink with a synthetic alert.
    pub async fn probe_all(&self) -> Vec<(String, Result<(), NotifyError>)> {
        join_all(self.sinks.iter().map(|slot| async move {
            let result = match tokio::time::timeout(slot.timeout, slot.sink.probe()).await {
                Ok(r) => r,
                Err(_) => Err(NotifyError::Timeout(slot.timeout)),
            };
            (slot.sink.sink_name().to_string(), result)
        }))
        .await
    }
}

async fn deliver_one(slot: &RegisteredSink, alert: &AlertEvent) -> DispatchOutcome {
    let sink_name = slot.sink.sink_name();
    let attempted_at = Utc::now();
    let start = Instant::now();

    let result = match tokio::time::timeout(slot.timeout, slot.sink.deliver(alert)).await {
        Ok(r) => r,
        Err(_) => Err(NotifyError::Timeout(slot.timeout)),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => {
            tracing::info!(
                rule_id = %alert.rule_id,
                alert_id = %alert.alert_id,
                sink = sink_name,
                duration_ms,
                "alert delivered"
            );
            DispatchOutcome::delivered(sink_name, &alert.alert_id, attempted_at, duration_ms)
        }
        Err(e) => {
            tracing::warn!(
                rule_id = %alert.rule_id,
                alert_id = %alert.alert_id,
                sink = sink_name,
                error = %e,
                duration_ms,
                "alert delivery failed"
            );
            DispatchOutcome::failed(sink_name, &alert.alert_id, attempted_at, duration_ms, e.to_string())
        }
    }
}
