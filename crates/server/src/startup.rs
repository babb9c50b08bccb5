//! Startup: store connectivity, sink construction, cycle assembly.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use logwatch_core::config::AlertingConfig;
use logwatch_core::Config;
use logwatch_notify::{
    AlertIndexWriter, AlertStoreSink, Dispatcher, FileSink, NotifyError, TemplateRenderer,
    WebhookSink,
};
use logwatch_rules::{LogQuery, RuleEvaluator, RuleSet};
use logwatch_storage::SearchClient;

use crate::cycle::DetectionCycle;

/// Build the store client and wait until it answers, within the configured
/// retry budget.
pub async fn connect_store(config: &Config) -> anyhow::Result<Arc<SearchClient>> {
    let client = SearchClient::from_config(&config.store, &config.indices)?;
    client
        .wait_until_ready(
            config.store.startup_retries,
            Duration::from_secs(config.store.startup_backoff_seconds),
        )
        .await?;
    Ok(Arc::new(client))
}

/// Register every enabled sink, in the fixed order file, webhook, alert store.
///
/// The alert-store sink needs `alert_writer`; enabling it without one is a
/// configuration error.
pub fn build_dispatcher(
    alerting: &AlertingConfig,
    alert_writer: Option<Arc<dyn AlertIndexWriter>>,
) -> Result<Dispatcher, NotifyError> {
    let mut dispatcher = Dispatcher::new();

    if alerting.file.enabled {
        dispatcher.register(
            Arc::new(FileSink::from_config(&alerting.file)),
            Duration::from_secs(alerting.file.timeout_seconds),
        );
    }

    if alerting.webhook.enabled {
        let sink = WebhookSink::from_config(&alerting.webhook, Arc::new(TemplateRenderer::new()))?;
        dispatcher.register(
            Arc::new(sink),
            Duration::from_secs(alerting.webhook.timeout_seconds),
        );
    }

    if alerting.alert_store.enabled {
        let writer = alert_writer.ok_or_else(|| {
            NotifyError::Config("alert_store sink enabled without an alert index".to_string())
        })?;
        dispatcher.register(
            Arc::new(AlertStoreSink::new(writer)),
            Duration::from_secs(alerting.alert_store.timeout_seconds),
        );
    }

    if dispatcher.is_empty() {
        tracing::warn!("no sinks enabled, alerts will only be logged");
    } else {
        info!(sinks = ?dispatcher.sink_names(), "dispatcher ready");
    }
    Ok(dispatcher)
}

pub fn build_cycle(
    config: &Config,
    rules: Arc<RuleSet>,
    query: Arc<dyn LogQuery>,
    dispatcher: Arc<Dispatcher>,
) -> DetectionCycle {
    let evaluator =
        RuleEvaluator::new(query, config.store.timeout()).with_sample_size(config.store.sample_size);
    DetectionCycle::new(rules, evaluator, dispatcher)
}
