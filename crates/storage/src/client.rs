//! HTTP client for an OpenSearch-compatible store.

use std::time::Duration;

use logwatch_core::config::{IndicesConfig, StoreConfig};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::error::StorageError;

/// Client bound to one store and its logs/alerts indices.
///
/// Every request carries the configured timeout and, when set, basic auth.
#[derive(Debug, Clone)]
pub struct SearchClient {
    base: Url,
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
    logs_index: String,
    alerts_index: String,
    timeout: Duration,
}

impl SearchClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        logs_index: impl Into<String>,
        alerts_index: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let base =
            Url::parse(base_url).map_err(|e| StorageError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StorageError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("logwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base,
            client,
            username: None,
            password: None,
            logs_index: logs_index.into(),
            alerts_index: alerts_index.into(),
            timeout,
        })
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    pub fn from_config(store: &StoreConfig, indices: &IndicesConfig) -> Result<Self, StorageError> {
        let client = Self::new(&store.url, store.timeout(), &indices.logs, &indices.alerts)?;
        Ok(match &store.username {
            Some(user) => client.with_basic_auth(user, store.password.clone()),
            None => client,
        })
    }

    pub fn logs_index(&self) -> &str {
        &self.logs_index
    }

    pub fn alerts_index(&self) -> &str {
        &self.alerts_index
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Base URL with `segments` appended as path components.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    /// Send and decode a JSON response, turning non-2xx into [`StorageError::Status`].
    pub(crate) async fn send_json(&self, request: RequestBuilder) -> Result<Value, StorageError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| StorageError::Malformed(e.to_string()))
    }

    /// Fetch the cluster root document.
    pub async fn ping(&self) -> Result<(), StorageError> {
        let url = self.endpoint(&[])?;
        self.send_json(self.request(Method::GET, url)).await?;
        Ok(())
    }

    /// Ping until the store answers, waiting `backoff * attempt` between
    /// tries. Makes `retries + 1` attempts in total.
    pub async fn wait_until_ready(&self, retries: u32, backoff: Duration) -> Result<(), StorageError> {
        let attempts = retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.ping().await {
                Ok(()) => {
                    info!(url = %self.base, attempt, "store reachable");
                    return Ok(());
                }
                Err(e) => {
                    warn!(url = %self.base, attempt, attempts, error = %e, "store not reachable");
                    last_error = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(backoff.saturating_mul(attempt)).await;
            }
        }

        Err(StorageError::Unreachable {
            attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::stub_server;

    fn client(base: &str) -> SearchClient {
        SearchClient::new(base, Duration::from_secs(5), "logs", "alerts").unwrap()
    }

    #[test]
    fn endpoint_appends_segments() {
        let c = client("http://localhost:9200");
        assert_eq!(
            c.endpoint(&["logs", "_search"]).unwrap().as_str(),
            "http://localhost:9200/logs/_search"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let c = client("https://proxy.internal/opensearch/");
        assert_eq!(
            c.endpoint(&["alerts", "_create", "abc"]).unwrap().as_str(),
            "https://proxy.internal/opensearch/alerts/_create/abc"
        );
    }

    #[test]
    fn rejects_unparseable_url() {
        let err = SearchClient::new("not a url", Duration::from_secs(1), "l", "a").unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl(_)));
    }

    #[test]
    fn from_config_uses_indices_and_auth() {
        let store: StoreConfig = store_config("http://localhost:9200");
        let indices = IndicesConfig {
            logs: "app-logs".to_string(),
            alerts: "app-alerts".to_string(),
        };
        let c = SearchClient::from_config(&store, &indices).unwrap();
        assert_eq!(c.logs_index(), "app-logs");
        assert_eq!(c.alerts_index(), "app-alerts");
        assert_eq!(c.username.as_deref(), Some("detector"));
        assert_eq!(c.timeout(), Duration::from_secs(7));
    }

    fn store_config(url: &str) -> StoreConfig {
        serde_json::from_value(serde_json::json!({
            "url": url,
            "timeout_seconds": 7,
            "username": "detector",
            "password": "hunter2",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn ping_sends_basic_auth() {
        let (base, mut requests) = stub_server(vec![(200, r#"{"version":{"number":"2.11.0"}}"#)]).await;
        let c = client(&base).with_basic_auth("detector", Some("hunter2".to_string()));

        c.ping().await.unwrap();

        let raw = requests.recv().await.unwrap();
        assert!(raw.starts_with("GET / "));
        // base64("detector:hunter2")
        assert!(raw.contains("ZGV0ZWN0b3I6aHVudGVyMg=="));
    }

    #[tokio::test]
    async fn wait_until_ready_retries_until_success() {
        let (base, _requests) = stub_server(vec![
            (503, "warming up"),
            (503, "warming up"),
            (200, "{}"),
        ])
        .await;

        client(&base)
            .wait_until_ready(3, Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn huge_backoff_sleeps_instead_of_overflowing() {
        let (base, _r) = stub_server(vec![(503, "warming up")]).await;
        let c = client(&base);
        let wait = c.wait_until_ready(2, Duration::MAX);
        // Still sleeping after the first failed attempt.
        tokio::time::timeout(Duration::from_millis(500), wait)
            .await
            .unwrap_err();
    }

    #[tokio::test]
    async fn wait_until_ready_gives_up_after_budget() {
        let err = client("http://127.0.0.1:1")
            .wait_until_ready(1, Duration::from_millis(10))
            .await
            .unwrap_err();
        match err {
            StorageError::Unreachable { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected Unreachable, got: {other:?}"),
        }
    }
}
