//! In-memory [`LogQuery`] over a vector of records.

use logwatch_core::LogRecord;
use tokio::sync::RwLock;

use crate::schema::{scalar_text, value_matches};

use super::types::{AggregateQuery, GroupCounts, LogQuery, QueryError};

/// Log store held in process memory.
///
/// Applies the same semantics as the search-backed adapter: inclusive window
/// bounds, exact scalar matches, records lacking the group field ignored.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    records: RwLock<Vec<LogRecord>>,
}

impl MemoryLogStore {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn push(&self, record: LogRecord) {
        self.records.write().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait::async_trait]
impl LogQuery for MemoryLogStore {
    async fn aggregate(&self, query: &AggregateQuery) -> Result<GroupCounts, QueryError> {
        query.validate()?;

        let records = self.records.read().await;
        let mut counts = GroupCounts::new();

        for (idx, record) in records.iter().enumerate() {
            if !query.window.contains(record.timestamp) {
                continue;
            }

            let doc = serde_json::to_value(record)
                .map_err(|e| QueryError::MalformedResponse(e.to_string()))?;

            let matched = query.filter.iter().all(|(field, expected)| {
                doc.get(field)
                    .map(|actual| value_matches(actual, expected))
                    .unwrap_or(false)
            });
            if !matched {
                continue;
            }

            let Some(key) = doc.get(&query.group_by).and_then(scalar_text) else {
                continue;
            };

            let bucket = counts.entry(key).or_default();
            bucket.count += 1;
            if bucket.sample_refs.len() < query.sample_size {
                let id = record.id.clone().unwrap_or_else(|| format!("mem-{idx}"));
                bucket.sample_refs.push(id);
            }
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use logwatch_core::rule::MatchFilter;
    use logwatch_core::TimeWindow;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn auth(ip: &str, event: &str, minutes_ago: i64) -> LogRecord {
        LogRecord {
            id: None,
            timestamp: now() - Duration::minutes(minutes_ago),
            log_type: Some("auth".to_string()),
            source_ip: Some(ip.to_string()),
            event_type: Some(event.to_string()),
            status_code: None,
            method: None,
            path: None,
            user: None,
            host: None,
            message: None,
        }
    }

    fn failed_login_query(sample_size: usize) -> AggregateQuery {
        let mut filter = MatchFilter::new();
        filter.insert("event_type".to_string(), json!("failed_login"));
        AggregateQuery {
            filter,
            group_by: "source_ip".to_string(),
            window: TimeWindow::trailing(now(), 10).unwrap(),
            sample_size,
        }
    }

    #[tokio::test]
    async fn counts_matching_records_per_group() {
        let store = MemoryLogStore::new(vec![
            auth("10.0.0.5", "failed_login", 1),
            auth("10.0.0.5", "failed_login", 2),
            auth("10.0.0.5", "login", 3),
            auth("10.0.0.9", "failed_login", 4),
        ]);
        let counts = store.aggregate(&failed_login_query(0)).await.unwrap();
        assert_eq!(counts["10.0.0.5"].count, 2);
        assert_eq!(counts["10.0.0.9"].count, 1);
        assert_eq!(counts.len(), 2);
    }

    #[tokio::test]
    async fn records_outside_window_are_ignored() {
        let store = MemoryLogStore::new(vec![
            auth("10.0.0.5", "failed_login", 10),
            auth("10.0.0.5", "failed_login", 11),
        ]);
        let counts = store.aggregate(&failed_login_query(0)).await.unwrap();
        assert_eq!(counts["10.0.0.5"].count, 1);
    }

    #[tokio::test]
    async fn empty_store_yields_empty_counts() {
        let store = MemoryLogStore::default();
        let counts = store.aggregate(&failed_login_query(3)).await.unwrap();
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn samples_are_capped() {
        let store = MemoryLogStore::new(
            (0..5).map(|i| auth("10.0.0.5", "failed_login", i)).collect(),
        );
        let counts = store.aggregate(&failed_login_query(2)).await.unwrap();
        assert_eq!(counts["10.0.0.5"].count, 5);
        assert_eq!(counts["10.0.0.5"].sample_refs, vec!["mem-0", "mem-1"]);
    }

    #[tokio::test]
    async fn unknown_group_field_is_rejected() {
        let store = MemoryLogStore::default();
        let mut query = failed_login_query(0);
        query.group_by = "ip".to_string();
        assert_eq!(
            store.aggregate(&query).await,
            Err(QueryError::UnknownField("ip".to_string()))
        );
    }

    #[tokio::test]
    async fn numeric_filters_match_status_codes() {
        let mut rec = auth("203.0.113.7", "request", 1);
        rec.status_code = Some(404);
        let store = MemoryLogStore::new(vec![rec]);
        store.push(auth("203.0.113.7", "request", 1)).await;

        let mut filter = MatchFilter::new();
        filter.insert("status_code".to_string(), json!(404));
        let query = AggregateQuery {
            filter,
            group_by: "source_ip".to_string(),
            window: TimeWindow::trailing(now(), 5).unwrap(),
            sample_size: 0,
        };
        let counts = store.aggregate(&query).await.unwrap();
        assert_eq!(counts["203.0.113.7"].count, 1);
        assert_eq!(store.len().await, 2);
    }
}
