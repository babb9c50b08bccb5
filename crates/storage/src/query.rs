//! Grouped counts over the logs index via a terms aggregation.
//!
//! Filter values are matched with `term` queries on the plain field names,
//! so string fields are expected to be mapped as `keyword`.

use chrono::SecondsFormat;
use logwatch_core::TIMESTAMP_FIELD;
use logwatch_rules::schema::scalar_text;
use logwatch_rules::{AggregateQuery, GroupBucket, GroupCounts, LogQuery, QueryError};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::SearchClient;
use crate::error::StorageError;

/// Upper bound on distinct groups returned by one aggregation.
pub const MAX_GROUPS: usize = 10_000;

const GROUPS_AGG: &str = "groups";
const SAMPLES_AGG: &str = "samples";

/// Build the `_search` body for an aggregation request.
pub fn build_aggregate_body(query: &AggregateQuery) -> Value {
    let mut filters: Vec<Value> = query
        .filter
        .iter()
        .map(|(field, value)| json!({ "term": { field: value } }))
        .collect();
    filters.push(json!({
        "range": {
            TIMESTAMP_FIELD: {
                "gte": query.window.start.to_rfc3339_opts(SecondsFormat::Millis, true),
                "lte": query.window.end.to_rfc3339_opts(SecondsFormat::Millis, true),
                "format": "strict_date_optional_time",
            }
        }
    }));

    let mut groups = json!({
        "terms": {
            "field": query.group_by,
            "size": MAX_GROUPS,
        }
    });
    if query.sample_size > 0 {
        groups["aggs"] = json!({
            SAMPLES_AGG: {
                "top_hits": {
                    "size": query.sample_size,
                    "_source": false,
                    "sort": [{ TIMESTAMP_FIELD: { "order": "desc" } }],
                }
            }
        });
    }

    json!({
        "size": 0,
        "track_total_hits": false,
        "query": { "bool": { "filter": filters } },
        "aggs": { GROUPS_AGG: groups },
    })
}

/// Extract per-group counts and sample ids from a `_search` response.
pub fn parse_aggregate_response(response: &Value) -> Result<GroupCounts, StorageError> {
    let buckets = response
        .pointer(&format!("/aggregations/{GROUPS_AGG}/buckets"))
        .and_then(Value::as_array)
        .ok_or_else(|| StorageError::Malformed("missing aggregations.groups.buckets".to_string()))?;

    let mut counts = GroupCounts::new();
    for bucket in buckets {
        let key = bucket
            .get("key_as_string")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| bucket.get("key").and_then(scalar_text))
            .ok_or_else(|| StorageError::Malformed(format!("bucket without usable key: {bucket}")))?;
        let count = bucket
            .get("doc_count")
            .and_then(Value::as_u64)
            .ok_or_else(|| StorageError::Malformed(format!("bucket '{key}' without doc_count")))?;

        let sample_refs = bucket
            .pointer(&format!("/{SAMPLES_AGG}/hits/hits"))
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .filter_map(|h| h.get("_id").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        counts.insert(key, GroupBucket { count, sample_refs });
    }
    Ok(counts)
}

/// Matching records that fell into groups beyond [`MAX_GROUPS`].
pub fn omitted_doc_count(response: &Value) -> u64 {
    response
        .pointer(&format!("/aggregations/{GROUPS_AGG}/sum_other_doc_count"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

impl SearchClient {
    async fn run_aggregate(&self, query: &AggregateQuery) -> Result<GroupCounts, StorageError> {
        let url = self.endpoint(&[self.logs_index(), "_search"])?;
        let body = build_aggregate_body(query);
        let response = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;

        let omitted = omitted_doc_count(&response);
        if omitted > 0 {
            warn!(
                index = self.logs_index(),
                group_by = %query.group_by,
                filter = ?query.filter,
                window_start = %query.window.start,
                window_end = %query.window.end,
                max_groups = MAX_GROUPS,
                omitted_records = omitted,
                "group limit reached, records in further groups were not evaluated"
            );
        }
        parse_aggregate_response(&response)
    }
}

#[async_trait::async_trait]
impl LogQuery for SearchClient {
    async fn aggregate(&self, query: &AggregateQuery) -> Result<GroupCounts, QueryError> {
        query.validate()?;
        let counts = self
            .run_aggregate(query)
            .await
            .map_err(|e| e.into_query_error(self.timeout()))?;
        debug!(
            index = self.logs_index(),
            group_by = %query.group_by,
            groups = counts.len(),
            "aggregation complete"
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{body_of, stub_server};
    use chrono::{TimeZone, Utc};
    use logwatch_core::rule::MatchFilter;
    use logwatch_core::TimeWindow;
    use std::time::Duration;

    fn failed_login_query() -> AggregateQuery {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut filter = MatchFilter::new();
        filter.insert("event_type".to_string(), json!("failed_login"));
        AggregateQuery {
            filter,
            group_by: "source_ip".to_string(),
            window: TimeWindow::trailing(end, 10).unwrap(),
            sample_size: 2,
        }
    }

    #[test]
    fn body_filters_by_term_and_inclusive_range() {
        let body = build_aggregate_body(&failed_login_query());
        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters[0], json!({ "term": { "event_type": "failed_login" } }));
        assert_eq!(filters[1]["range"]["timestamp"]["gte"], "2024-03-01T11:50:00.000Z");
        assert_eq!(filters[1]["range"]["timestamp"]["lte"], "2024-03-01T12:00:00.000Z");
        assert_eq!(body["size"], 0);
    }

    #[test]
    fn body_groups_by_field_with_samples() {
        let body = build_aggregate_body(&failed_login_query());
        assert_eq!(body["aggs"]["groups"]["terms"]["field"], "source_ip");
        assert_eq!(body["aggs"]["groups"]["terms"]["size"], MAX_GROUPS);
        assert_eq!(body["aggs"]["groups"]["aggs"]["samples"]["top_hits"]["size"], 2);
    }

    #[test]
    fn body_omits_samples_when_not_requested() {
        let mut query = failed_login_query();
        query.sample_size = 0;
        let body = build_aggregate_body(&query);
        assert!(body["aggs"]["groups"].get("aggs").is_none());
    }

    #[test]
    fn parse_string_and_numeric_keys() {
        let response = json!({
            "aggregations": { "groups": { "buckets": [
                { "key": "10.0.0.5", "doc_count": 6,
                  "samples": { "hits": { "hits": [ { "_id": "a" }, { "_id": "b" } ] } } },
                { "key": 404, "doc_count": 72 }
            ] } }
        });
        let counts = parse_aggregate_response(&response).unwrap();
        assert_eq!(counts["10.0.0.5"].count, 6);
        assert_eq!(counts["10.0.0.5"].sample_refs, vec!["a", "b"]);
        assert_eq!(counts["404"].count, 72);
        assert!(counts["404"].sample_refs.is_empty());
    }

    #[test]
    fn omitted_records_are_read_from_sum_other_doc_count() {
        let truncated = json!({
            "aggregations": { "groups": { "sum_other_doc_count": 41, "buckets": [] } }
        });
        assert_eq!(omitted_doc_count(&truncated), 41);

        let complete = json!({ "aggregations": { "groups": { "buckets": [] } } });
        assert_eq!(omitted_doc_count(&complete), 0);
    }

    #[test]
    fn parse_prefers_key_as_string() {
        let response = json!({
            "aggregations": { "groups": { "buckets": [
                { "key": 1, "key_as_string": "true", "doc_count": 3 }
            ] } }
        });
        let counts = parse_aggregate_response(&response).unwrap();
        assert_eq!(counts["true"].count, 3);
    }

    #[test]
    fn parse_empty_buckets() {
        let response = json!({ "aggregations": { "groups": { "buckets": [] } } });
        assert!(parse_aggregate_response(&response).unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_missing_aggregation() {
        let err = parse_aggregate_response(&json!({ "hits": {} })).unwrap_err();
        assert!(matches!(err, StorageError::Malformed(_)));
    }

    fn client(base: &str) -> SearchClient {
        SearchClient::new(base, Duration::from_secs(5), "app-logs", "app-alerts").unwrap()
    }

    #[tokio::test]
    async fn aggregate_posts_to_logs_index() {
        let (base, mut requests) = stub_server(vec![(
            200,
            r#"{"aggregations":{"groups":{"buckets":[{"key":"10.0.0.5","doc_count":6}]}}}"#,
        )])
        .await;

        let counts = client(&base).aggregate(&failed_login_query()).await.unwrap();
        assert_eq!(counts["10.0.0.5"].count, 6);

        let raw = requests.recv().await.unwrap();
        assert!(raw.starts_with("POST /app-logs/_search "));
        assert_eq!(body_of(&raw)["aggs"]["groups"]["terms"]["field"], "source_ip");
    }

    #[tokio::test]
    async fn truncated_aggregation_still_returns_groups() {
        let (base, _r) = stub_server(vec![(
            200,
            r#"{"aggregations":{"groups":{"sum_other_doc_count":12,"buckets":[{"key":"10.0.0.5","doc_count":6}]}}}"#,
        )])
        .await;

        let counts = client(&base).aggregate(&failed_login_query()).await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts["10.0.0.5"].count, 6);
    }

    #[tokio::test]
    async fn server_error_maps_to_store_unavailable() {
        let (base, _r) = stub_server(vec![(503, "overloaded")]).await;
        let err = client(&base).aggregate(&failed_login_query()).await.unwrap_err();
        assert!(matches!(err, QueryError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn client_error_maps_to_rejected() {
        let (base, _r) = stub_server(vec![(400, "parsing_exception")]).await;
        let err = client(&base).aggregate(&failed_login_query()).await.unwrap_err();
        assert_eq!(
            err,
            QueryError::Rejected {
                status: 400,
                reason: "parsing_exception".to_string()
            }
        );
    }

    #[tokio::test]
    async fn garbage_body_maps_to_malformed() {
        let (base, _r) = stub_server(vec![(200, "<html>")]).await;
        let err = client(&base).aggregate(&failed_login_query()).await.unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn connection_refused_maps_to_store_unavailable() {
        let err = client("http://127.0.0.1:1")
            .aggregate(&failed_login_query())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn unknown_group_field_never_reaches_the_store() {
        let mut query = failed_login_query();
        query.group_by = "ip".to_string();
        let err = client("http://127.0.0.1:1").aggregate(&query).await.unwrap_err();
        assert_eq!(err, QueryError::UnknownField("ip".to_string()));
    }
}
