//! Subcommand handlers for the `logwatch` binary.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use logwatch_core::{Config, Severity};
use logwatch_notify::AlertIndexWriter;
use logwatch_rules::{IntervalScheduler, LogQuery, RuleSet};
use logwatch_storage::{AlertQuery, SearchClient};

use crate::shutdown::spawn_signal_listener;
use crate::startup::{build_cycle, build_dispatcher, connect_store};

/// Run the detector until SIGINT/SIGTERM, or for a single cycle with `once`.
pub async fn run(config: Config, once: bool) -> anyhow::Result<()> {
    config.log_summary();

    let rules = Arc::new(RuleSet::load(&config.rules));
    if rules.is_empty() {
        warn!("no active rules, cycles will do nothing");
    }

    let store = connect_store(&config)
        .await
        .context("log store did not become reachable")?;

    let writer: Arc<dyn AlertIndexWriter> = store.clone();
    let dispatcher = Arc::new(build_dispatcher(&config.alerting, Some(writer))?);
    let query: Arc<dyn LogQuery> = store;
    let cycle = Arc::new(build_cycle(&config, rules, query, dispatcher));

    let cancel = CancellationToken::new();
    let signals = spawn_signal_listener(cancel.clone());

    let scheduler = IntervalScheduler::new(
        config.scheduler.interval(),
        config.scheduler.shutdown_grace(),
    );

    let result = if once {
        scheduler.run_once(cycle, cancel.clone()).await.map(|report| {
            info!(
                alerts = report.alerts_raised,
                failures = report.rules_failed,
                "single cycle finished"
            );
        })
    } else {
        scheduler.run(cycle, cancel.clone()).await.map(|summary| {
            info!(
                started = summary.cycles_started,
                completed = summary.cycles_completed,
                skipped = summary.cycles_skipped,
                aborted = summary.cycles_aborted,
                "scheduler stopped"
            );
        })
    };

    signals.abort();
    result.context("scheduler stopped on a fatal error")?;
    Ok(())
}

/// Validate the configuration and rule set, optionally probing every sink.
///
/// Fails when any rule would be skipped at startup or any probe fails.
pub async fn check_config(config: &Config, probe_sinks: bool) -> anyhow::Result<()> {
    let (rules, warnings) = RuleSet::from_definitions(&config.rules);

    println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
    println!(
        "rules: {} active, {} disabled, {} rejected",
        rules.len(),
        rules.disabled_count(),
        warnings.len()
    );
    for warning in &warnings {
        println!("  warning: {warning}");
    }

    if probe_sinks {
        let client = SearchClient::from_config(&config.store, &config.indices)?;
        let writer: Arc<dyn AlertIndexWriter> = Arc::new(client);
        let dispatcher = build_dispatcher(&config.alerting, Some(writer))?;

        let mut failed = 0;
        for (sink, result) in dispatcher.probe_all().await {
            match result {
                Ok(()) => println!("sink {sink}: ok"),
                Err(e) => {
                    failed += 1;
                    println!("sink {sink}: FAILED ({e})");
                }
            }
        }
        if failed > 0 {
            bail!("{failed} sink probe(s) failed");
        }
    }

    if !warnings.is_empty() {
        bail!("{} rule(s) would be skipped", warnings.len());
    }
    Ok(())
}

/// Print alerts from the alert index, newest first, one JSON object per line.
pub async fn alerts(
    config: &Config,
    since_minutes: i64,
    rule: Option<String>,
    severity: Option<Severity>,
    limit: usize,
) -> anyhow::Result<()> {
    if since_minutes <= 0 {
        bail!("--since-minutes must be positive");
    }
    let client = SearchClient::from_config(&config.store, &config.indices)?;
    let query = AlertQuery {
        since: Some(chrono::Utc::now() - chrono::Duration::minutes(since_minutes)),
        until: None,
        rule_id: rule,
        severity,
        limit,
    };

    let found = client.search_alerts(&query).await?;
    for alert in &found {
        println!("{}", serde_json::to_string(alert)?);
    }
    info!(count = found.len(), index = client.alerts_index(), "alerts listed");
    Ok(())
}

/// Print the most recent log records, one JSON object per line.
pub async fn logs(config: &Config, limit: usize, log_type: Option<String>) -> anyhow::Result<()> {
    let client = SearchClient::from_config(&config.store, &config.indices)?;
    let records = client.recent_logs(limit, log_type.as_deref()).await?;
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    info!(count = records.len(), index = client.logs_index(), "logs listed");
    Ok(())
}
