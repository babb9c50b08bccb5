//! Alert index: create-only writes and the alert read contract.

use chrono::{DateTime, SecondsFormat, Utc};
use logwatch_core::{AlertEvent, Severity};
use logwatch_notify::{AlertIndexWriter, IndexWrite, NotifyError};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::client::SearchClient;
use crate::error::StorageError;

/// Read filter over stored alerts. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub rule_id: Option<String>,
    pub severity: Option<Severity>,
    pub limit: usize,
}

pub fn build_alert_search_body(query: &AlertQuery) -> Value {
    let mut filters = Vec::new();
    if query.since.is_some() || query.until.is_some() {
        let mut range = serde_json::Map::new();
        if let Some(since) = query.since {
            range.insert("gte".into(), json!(since.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }
        if let Some(until) = query.until {
            range.insert("lte".into(), json!(until.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }
        filters.push(json!({ "range": { "detected_at": range } }));
    }
    if let Some(rule_id) = &query.rule_id {
        filters.push(json!({ "term": { "rule_id": rule_id } }));
    }
    if let Some(severity) = query.severity {
        filters.push(json!({ "term": { "severity": severity.to_string() } }));
    }

    json!({
        "size": query.limit,
        "sort": [{ "detected_at": { "order": "desc" } }],
        "query": { "bool": { "filter": filters } },
    })
}

/// Decode `hits.hits[]._source` documents.
pub(crate) fn parse_hits<T: serde::de::DeserializeOwned>(
    response: &Value,
) -> Result<Vec<(Option<String>, T)>, StorageError> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| StorageError::Malformed("missing hits.hits".to_string()))?;

    hits.iter()
        .map(|hit| {
            let id = hit.get("_id").and_then(Value::as_str).map(str::to_string);
            let source = hit
                .get("_source")
                .cloned()
                .ok_or_else(|| StorageError::Malformed("hit without _source".to_string()))?;
            let doc = serde_json::from_value(source)
                .map_err(|e| StorageError::Malformed(format!("bad document {id:?}: {e}")))?;
            Ok((id, doc))
        })
        .collect()
}

impl SearchClient {
    /// Write an alert keyed by its id. Never overwrites: an existing
    /// document yields [`IndexWrite::AlreadyExists`].
    pub async fn create_alert(&self, alert: &AlertEvent) -> Result<IndexWrite, StorageError> {
        let url = self.endpoint(&[self.alerts_index(), "_create", &alert.alert_id])?;
        let response = self.request(Method::PUT, url).json(alert).send().await?;

        match response.status() {
            s if s.is_success() => Ok(IndexWrite::Created),
            StatusCode::CONFLICT => Ok(IndexWrite::AlreadyExists),
            s => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                Err(StorageError::Status {
                    status: s.as_u16(),
                    body,
                })
            }
        }
    }

    /// Stored alerts matching `query`, newest first.
    pub async fn search_alerts(&self, query: &AlertQuery) -> Result<Vec<AlertEvent>, StorageError> {
        let url = self.endpoint(&[self.alerts_index(), "_search"])?;
        let body = build_alert_search_body(query);
        let response = match self
            .send_json(self.request(Method::POST, url).json(&body))
            .await
        {
            Err(StorageError::Status { status: 404, .. }) => return Ok(Vec::new()),
            other => other?,
        };
        Ok(parse_hits::<AlertEvent>(&response)?
            .into_iter()
            .map(|(_, alert)| alert)
            .collect())
    }
}

#[async_trait::async_trait]
impl AlertIndexWriter for SearchClient {
    async fn index_alert(&self, alert: &AlertEvent) -> Result<IndexWrite, NotifyError> {
        Ok(self.create_alert(alert).await?)
    }

    /// The alerts index may not exist until the first write; a 404 still
    /// proves the store is reachable.
    async fn check_writable(&self) -> Result<(), NotifyError> {
        let url = self.endpoint(&[self.alerts_index()])?;
        let response = self
            .request(Method::HEAD, url)
            .send()
            .await
            .map_err(StorageError::from)?;
        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            s => Err(NotifyError::Status {
                status: s.as_u16(),
                body: String::new(),
            }),
        }
    }
}
