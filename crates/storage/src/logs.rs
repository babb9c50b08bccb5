//! Raw-log read contract.

use logwatch_core::LogRecord;
use reqwest::Method;
use serde_json::{json, Value};

use crate::alerts::parse_hits;
use crate::client::SearchClient;
use crate::error::StorageError;

pub fn build_recent_logs_body(limit: usize, log_type: Option<&str>) -> Value {
    let filters: Vec<Value> = log_type
        .map(|t| vec![json!({ "term": { "log_type": t } })])
        .unwrap_or_default();
    json!({
        "size": limit,
        "sort": [{ "timestamp": { "order": "desc" } }],
        "query": { "bool": { "filter": filters } },
    })
}

impl SearchClient {
    /// Most recent log records, newest first, optionally restricted to one
    /// `log_type`. Records take the store's document id when they carry none.
    pub async fn recent_logs(
        &self,
        limit: usize,
        log_type: Option<&str>,
    ) -> Result<Vec<LogRecord>, StorageError> {
        let url = self.endpoint(&[self.logs_index(), "_search"])?;
        let body = build_recent_logs_body(limit, log_type);
        let response = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;

        Ok(parse_hits::<LogRecord>(&response)?
            .into_iter()
            .map(|(id, mut record)| {
                if record.id.is_none() {
                    record.id = id;
                }
                record
            })
            .collect())
    }
}
