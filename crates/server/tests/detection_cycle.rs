//! End-to-end detection cycles over an in-memory log store and real sinks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use logwatch_core::{AlertEvent, LogRecord, RuleDefinition, Severity};
use logwatch_notify::{
    AlertIndexWriter, AlertSink, AlertStoreSink, Dispatcher, FileSink, IndexWrite, NotifyError,
};
use logwatch_rules::query::MemoryLogStore;
use logwatch_rules::{Cycle, RuleEvaluator, RuleSet};
use logwatch_server::DetectionCycle;

// ── Fixtures ────────────────────────────────────────────────────

fn record(log_type: &str, ip: &str, seconds_ago: i64) -> LogRecord {
    LogRecord {
        id: None,
        timestamp: Utc::now() - chrono::Duration::seconds(seconds_ago),
        log_type: Some(log_type.to_string()),
        source_ip: Some(ip.to_string()),
        event_type: None,
        status_code: None,
        method: None,
        path: None,
        user: None,
        host: None,
        message: None,
    }
}

fn failed_login(ip: &str, seconds_ago: i64) -> LogRecord {
    let mut r = record("auth", ip, seconds_ago);
    r.event_type = Some("failed_login".to_string());
    r
}

fn not_found(ip: &str, seconds_ago: i64) -> LogRecord {
    let mut r = record("access", ip, seconds_ago);
    r.status_code = Some(404);
    r.method = Some("GET".to_string());
    r
}

fn rule(id: &str, kind: &str, window: i64, threshold: i64) -> RuleDefinition {
    RuleDefinition {
        id: id.to_string(),
        enabled: true,
        kind: kind.to_string(),
        window_minutes: window,
        threshold,
        group_by_field: "source_ip".to_string(),
        match_filter: Default::default(),
        description: None,
    }
}

/// Webhook stand-in that always answers 500.
struct BrokenWebhook {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl AlertSink for BrokenWebhook {
    async fn deliver(&self, _alert: &AlertEvent) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Status {
            status: 500,
            body: "internal error".to_string(),
        })
    }

    fn sink_name(&self) -> &str {
        "webhook"
    }
}

/// Alert index held in memory with create-only semantics.
#[derive(Default)]
struct MemoryAlertIndex {
    stored: Mutex<Vec<AlertEvent>>,
}

#[async_trait::async_trait]
impl AlertIndexWriter for MemoryAlertIndex {
    async fn index_alert(&self, alert: &AlertEvent) -> Result<IndexWrite, NotifyError> {
        let mut stored = self.stored.lock().unwrap();
        if stored.iter().any(|a| a.alert_id == alert.alert_id) {
            return Ok(IndexWrite::AlreadyExists);
        }
        stored.push(alert.clone());
        Ok(IndexWrite::Created)
    }

    async fn check_writable(&self) -> Result<(), NotifyError> {
        Ok(())
    }
}

fn cycle_over(
    records: Vec<LogRecord>,
    defs: &[RuleDefinition],
    dispatcher: Dispatcher,
) -> DetectionCycle {
    let (rules, _) = RuleSet::from_definitions(defs);
    let store = Arc::new(MemoryLogStore::new(records));
    let evaluator = RuleEvaluator::new(store, Duration::from_secs(5));
    DetectionCycle::new(Arc::new(rules), evaluator, Arc::new(dispatcher))
}

fn read_lines(path: &std::path::Path) -> Vec<AlertEvent> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// ── Scenarios ───────────────────────────────────────────────────

#[tokio::test]
async fn brute_force_alert_reaches_file_and_alert_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    let index = Arc::new(MemoryAlertIndex::default());

    let dispatcher = Dispatcher::new()
        .with_sink(Arc::new(FileSink::new(&path)), Duration::from_secs(5))
        .with_sink(Arc::new(AlertStoreSink::new(index.clone())), Duration::from_secs(5));

    let mut records: Vec<_> = (0..6).map(|i| failed_login("10.0.0.5", 30 + i * 60)).collect();
    records.push(failed_login("10.0.0.9", 30));
    let cycle = cycle_over(
        records,
        &[rule("brute-force", "failed_login_threshold", 10, 5)],
        dispatcher,
    );

    let report = cycle.run(1, CancellationToken::new()).await;

    assert_eq!(report.rules_evaluated, 1);
    assert_eq!(report.alerts_raised, 1);
    assert_eq!(report.deliveries_ok, 2);
    assert_eq!(report.deliveries_failed, 0);
    assert!(!report.has_failures());

    let written = read_lines(&path);
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].group_key, "10.0.0.5");
    assert_eq!(written[0].count, 6);
    assert_eq!(written[0].severity, Severity::High);

    let stored = index.stored.lock().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].alert_id, written[0].alert_id);
}

#[tokio::test]
async fn failing_webhook_does_not_block_other_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    let webhook = Arc::new(BrokenWebhook {
        calls: AtomicUsize::new(0),
    });
    let index = Arc::new(MemoryAlertIndex::default());

    let dispatcher = Dispatcher::new()
        .with_sink(Arc::new(FileSink::new(&path)), Duration::from_secs(5))
        .with_sink(webhook.clone(), Duration::from_secs(5))
        .with_sink(Arc::new(AlertStoreSink::new(index.clone())), Duration::from_secs(5));

    let records = (0..60).map(|i| not_found("203.0.113.7", 10 + i)).collect();
    let cycle = cycle_over(records, &[rule("scan", "high_error_rate", 5, 50)], dispatcher);

    let report = cycle.run(1, CancellationToken::new()).await;

    assert_eq!(report.alerts_raised, 1);
    assert_eq!(report.deliveries_ok, 2);
    assert_eq!(report.deliveries_failed, 1);
    assert_eq!(webhook.calls.load(Ordering::SeqCst), 1);
    assert_eq!(read_lines(&path).len(), 1);
    assert_eq!(index.stored.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn no_sinks_means_alerts_are_raised_but_not_delivered() {
    let records = (0..5).map(|i| failed_login("10.0.0.5", 30 + i)).collect();
    let cycle = cycle_over(
        records,
        &[rule("brute-force", "failed_login_threshold", 10, 5)],
        Dispatcher::new(),
    );

    let report = cycle.run(1, CancellationToken::new()).await;

    assert_eq!(report.alerts_raised, 1);
    assert_eq!(report.deliveries_ok + report.deliveries_failed, 0);
}

#[tokio::test]
async fn rejected_rule_is_skipped_and_others_still_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    let dispatcher =
        Dispatcher::new().with_sink(Arc::new(FileSink::new(&path)), Duration::from_secs(5));

    let records = (0..6).map(|i| failed_login("10.0.0.5", 30 + i)).collect();
    let cycle = cycle_over(
        records,
        &[
            rule("zero", "failed_login_threshold", 10, 0),
            rule("brute-force", "failed_login_threshold", 10, 5),
        ],
        dispatcher,
    );

    let report = cycle.run(1, CancellationToken::new()).await;

    assert_eq!(report.rules_evaluated, 1);
    let written = read_lines(&path);
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].rule_id, "brute-force");
}

#[tokio::test]
async fn below_threshold_produces_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    let dispatcher =
        Dispatcher::new().with_sink(Arc::new(FileSink::new(&path)), Duration::from_secs(5));

    let records = (0..4).map(|i| failed_login("10.0.0.5", 30 + i)).collect();
    let cycle = cycle_over(
        records,
        &[rule("brute-force", "failed_login_threshold", 10, 5)],
        dispatcher,
    );

    let report = cycle.run(1, CancellationToken::new()).await;

    assert_eq!(report.rules_evaluated, 1);
    assert_eq!(report.alerts_raised, 0);
    assert!(read_lines(&path).is_empty());
}

#[tokio::test]
async fn cancelled_cycle_evaluates_no_rules() {
    let records = (0..6).map(|i| failed_login("10.0.0.5", 30 + i)).collect();
    let cycle = cycle_over(
        records,
        &[rule("brute-force", "failed_login_threshold", 10, 5)],
        Dispatcher::new(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = cycle.run(1, cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.rules_evaluated, 0);
    assert_eq!(report.rules_skipped, 1);
    assert_eq!(report.alerts_raised, 0);
}

/// Delivers successfully and cancels the cycle on its first delivery.
struct CancelOnDeliver {
    cancel: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl AlertSink for CancelOnDeliver {
    async fn deliver(&self, _alert: &AlertEvent) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "cancel-on-deliver"
    }
}

#[tokio::test]
async fn cancellation_between_alerts_stops_further_dispatch() {
    let cancel = CancellationToken::new();
    let sink = Arc::new(CancelOnDeliver {
        cancel: cancel.clone(),
        calls: AtomicUsize::new(0),
    });
    let dispatcher = Dispatcher::new().with_sink(sink.clone(), Duration::from_secs(5));

    let mut records: Vec<_> = (0..6).map(|i| failed_login("10.0.0.5", 30 + i)).collect();
    records.extend((0..7).map(|i| failed_login("10.0.0.9", 30 + i)));
    let cycle = cycle_over(
        records,
        &[
            rule("brute-force", "failed_login_threshold", 10, 5),
            rule("scan", "high_error_rate", 5, 50),
        ],
        dispatcher,
    );

    let report = cycle.run(1, cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.alerts_raised, 2);
    assert_eq!(report.deliveries_ok, 1);
    assert_eq!(report.rules_skipped, 1);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oversized_window_rule_is_skipped_and_cycle_completes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    let dispatcher =
        Dispatcher::new().with_sink(Arc::new(FileSink::new(&path)), Duration::from_secs(5));

    let records = (0..6).map(|i| failed_login("10.0.0.5", 30 + i)).collect();
    let cycle = cycle_over(
        records,
        &[
            rule("forever", "failed_login_threshold", 1_000_000_000_000, 5),
            rule("brute-force", "failed_login_threshold", 10, 5),
        ],
        dispatcher,
    );

    let report = tokio::spawn(async move { cycle.run(1, CancellationToken::new()).await })
        .await
        .unwrap();

    assert_eq!(report.rules_evaluated, 1);
    assert_eq!(report.rules_failed, 0);
    let written = read_lines(&path);
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].rule_id, "brute-force");
}
