//! HTTP webhook sink.
//!
//! Delivers each alert as a JSON document (every alert field) to a
//! configured endpoint, or renders a minijinja body template when one is
//! configured. Any non-2xx response, connection error, or timeout is a
//! failed delivery. There is no retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

use logwatch_core::config::WebhookSinkConfig;
use logwatch_core::AlertEvent;

use crate::templating::{TemplateContext, TemplateRenderer};
use crate::traits::{AlertSink, NotifyError};

/// Posts alerts to an HTTP endpoint.
///
/// Environment variable references (`${VAR_NAME}`) in the URL and header
/// values are resolved at construction time.
#[derive(Debug)]
pub struct WebhookSink {
    url: String,
    method: reqwest::Method,
    /// `Content-Type: application/json` unless configured otherwise.
    headers: HeaderMap,
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Create a webhook sink whose requests are bounded by `timeout`.
    ///
    /// Missing env vars and invalid body templates produce
    /// [`NotifyError::Config`]. `method` defaults to `POST`.
    pub fn new(
        url: String,
        method: Option<reqwest::Method>,
        headers: HashMap<String, String>,
        body_template: Option<String>,
        timeout: Duration,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self, NotifyError> {
        let resolved_url = resolve_env_vars(&url)?;
        reqwest::Url::parse(&resolved_url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook url '{resolved_url}': {e}")))?;

        let mut resolved_headers = HeaderMap::with_capacity(headers.len() + 1);
        resolved_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in &headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| NotifyError::Config(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(&resolve_env_vars(value)?)
                .map_err(|e| NotifyError::Config(format!("invalid value for header '{key}': {e}")))?;
            resolved_headers.insert(name, value);
        }

        if let Some(ref tmpl) = body_template {
            renderer
                .validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: resolved_url,
            method: method.unwrap_or(reqwest::Method::POST),
            headers: resolved_headers,
            body_template,
            renderer,
            client,
        })
    }

    /// Build from the `alerting.webhook` config section.
    pub fn from_config(
        config: &WebhookSinkConfig,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self, NotifyError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| NotifyError::Config("webhook sink enabled without a url".to_string()))?;

        let method = match &config.method {
            Some(m) => Some(
                m.to_uppercase()
                    .parse::<reqwest::Method>()
                    .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {m}")))?,
            ),
            None => None,
        };

        Self::new(
            url,
            method,
            config.headers.clone(),
            config.body_template.clone(),
            Duration::from_secs(config.timeout_seconds),
            renderer,
        )
    }

    fn render_body(&self, alert: &AlertEvent) -> Result<String, NotifyError> {
        match &self.body_template {
            Some(tmpl) => self.renderer.render(tmpl, &TemplateContext::for_alert(alert)),
            None => Ok(serde_json::to_string(alert)?),
        }
    }
}

#[async_trait::async_trait]
impl AlertSink for WebhookSink {
    async fn deliver(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
        let body = self.render_body(alert)?;

        let request = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone())
            .body(body);

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        tracing::debug!(
            url = %self.url,
            method = %self.method,
            status = %status,
            alert_id = %alert.alert_id,
            "webhook accepted alert"
        );

        Ok(())
    }

    fn sink_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
