use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rule::RuleDefinition;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Top-level config ──────────────────────────────────────────

/// Detector configuration, loaded once at startup and passed by reference
/// to every component constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub indices: IndicesConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub alerting: AlertingConfig,
}

/// On-disk format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

impl Config {
    /// Load, apply environment overrides, and validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, ConfigFormat::from_path(path))
    }

    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let mut config: Self = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply `LOGWATCH_*` environment overrides.
    ///
    /// - `LOGWATCH_STORE_URL` -> `store.url`
    /// - `LOGWATCH_STORE_TIMEOUT_SECONDS` -> `store.timeout_seconds`
    /// - `LOGWATCH_STORE_USERNAME` / `LOGWATCH_STORE_PASSWORD` -> basic auth
    /// - `LOGWATCH_WEBHOOK_URL` -> `alerting.webhook.url`
    /// - `LOGWATCH_SCHEDULER_INTERVAL_MINUTES` -> `scheduler.interval_minutes`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(env_opt);
    }

    pub(crate) fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LOGWATCH_STORE_URL") {
            self.store.url = v;
        }
        if let Some(v) = lookup("LOGWATCH_STORE_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            self.store.timeout_seconds = v;
        }
        if let Some(v) = lookup("LOGWATCH_STORE_USERNAME") {
            self.store.username = Some(v);
        }
        if let Some(v) = lookup("LOGWATCH_STORE_PASSWORD") {
            self.store.password = Some(v);
        }
        if let Some(v) = lookup("LOGWATCH_WEBHOOK_URL") {
            self.alerting.webhook.url = Some(v);
        }
        if let Some(v) =
            lookup("LOGWATCH_SCHEDULER_INTERVAL_MINUTES").and_then(|v| v.parse().ok())
        {
            self.scheduler.interval_minutes = v;
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Check every field the process cannot start without.
    ///
    /// Per-rule problems (unknown kind, non-positive threshold) are not
    /// errors here; they surface as warnings when the rule set is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_store()?;
        self.validate_indices()?;
        self.validate_scheduler()?;
        self.validate_alerting()?;
        self.validate_rule_ids()?;
        Ok(())
    }

    fn validate_store(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.store.url).map_err(|e| {
            ConfigError::Invalid(format!("store.url '{}' is not a valid URL: {e}", self.store.url))
        })?;
        if self.store.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "store.timeout_seconds must be positive".to_string(),
            ));
        }
        // The startup wait sleeps `backoff * attempt` before each retry.
        let backoff = self.store.startup_backoff_seconds;
        if backoff > MAX_STARTUP_BACKOFF_SECONDS
            || backoff
                .checked_mul(u64::from(self.store.startup_retries))
                .is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "store.startup_backoff_seconds must be at most {MAX_STARTUP_BACKOFF_SECONDS}, got {backoff}"
            )));
        }
        if self.store.startup_retries > MAX_STARTUP_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "store.startup_retries must be at most {MAX_STARTUP_RETRIES}, got {}",
                self.store.startup_retries
            )));
        }
        Ok(())
    }

    fn validate_indices(&self) -> Result<(), ConfigError> {
        if self.indices.logs.trim().is_empty() || self.indices.alerts.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "indices.logs and indices.alerts must be non-empty".to_string(),
            ));
        }
        if self.indices.logs == self.indices.alerts {
            return Err(ConfigError::Invalid(format!(
                "indices.alerts must differ from indices.logs (both '{}')",
                self.indices.logs
            )));
        }
        Ok(())
    }

    fn validate_scheduler(&self) -> Result<(), ConfigError> {
        let minutes = self.scheduler.interval_minutes;
        if minutes == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.interval_minutes must be positive".to_string(),
            ));
        }
        if minutes > MAX_INTERVAL_MINUTES || minutes.checked_mul(60).is_none() {
            return Err(ConfigError::Invalid(format!(
                "scheduler.interval_minutes must be at most {MAX_INTERVAL_MINUTES}, got {minutes}"
            )));
        }
        Ok(())
    }

    fn validate_alerting(&self) -> Result<(), ConfigError> {
        let file = &self.alerting.file;
        if file.enabled && file.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "alerting.file.path is required when the file sink is enabled".to_string(),
            ));
        }

        let webhook = &self.alerting.webhook;
        if webhook.enabled {
            let url = webhook.url.as_deref().unwrap_or_default();
            if url.is_empty() {
                return Err(ConfigError::Invalid(
                    "alerting.webhook.url is required when the webhook sink is enabled"
                        .to_string(),
                ));
            }
            // `${VAR}` references are resolved when the sink is built.
            if !url.contains("${") {
                url::Url::parse(url).map_err(|e| {
                    ConfigError::Invalid(format!("alerting.webhook.url '{url}' is invalid: {e}"))
                })?;
            }
            if webhook.timeout_seconds == 0 {
                return Err(ConfigError::Invalid(
                    "alerting.webhook.timeout_seconds must be positive".to_string(),
                ));
            }
        }

        if file.timeout_seconds == 0 || self.alerting.alert_store.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "sink timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_rule_ids(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(ConfigError::Invalid("rule id must be non-empty".to_string()));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate rule id '{}'", rule.id)));
            }
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let enabled_rules = self.rules.iter().filter(|r| r.enabled).count();
        tracing::info!("Config loaded:");
        tracing::info!(
            "  store:       url={}, timeout={}s, auth={}",
            self.store.url,
            self.store.timeout_seconds,
            self.store.username.is_some()
        );
        tracing::info!("  indices:     logs={}, alerts={}", self.indices.logs, self.indices.alerts);
        tracing::info!("  scheduler:   every {}m", self.scheduler.interval_minutes);
        tracing::info!("  rules:       {} defined, {} enabled", self.rules.len(), enabled_rules);
        tracing::info!(
            "  sinks:       file={}, webhook={}, alert_store={}",
            self.alerting.file.enabled,
            self.alerting.webhook.enabled,
            self.alerting.alert_store.enabled
        );
    }

    /// Return a redacted view safe for printing (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "store": {
                "url": self.store.url,
                "timeout_seconds": self.store.timeout_seconds,
                "auth_configured": self.store.username.is_some(),
            },
            "indices": { "logs": self.indices.logs, "alerts": self.indices.alerts },
            "scheduler": {
                "interval_minutes": self.scheduler.interval_minutes,
                "shutdown_grace_seconds": self.scheduler.shutdown_grace_seconds,
            },
            "rules": self.rules.iter().map(|r| &r.id).collect::<Vec<_>>(),
            "alerting": {
                "file": { "enabled": self.alerting.file.enabled, "path": self.alerting.file.path },
                "webhook": {
                    "enabled": self.alerting.webhook.enabled,
                    "method": self.alerting.webhook.method,
                    "headers": self.alerting.webhook.headers.keys().collect::<Vec<_>>(),
                },
                "alert_store": { "enabled": self.alerting.alert_store.enabled },
            },
        })
    }
}

// ── Store ─────────────────────────────────────────────────────

pub const MAX_STARTUP_BACKOFF_SECONDS: u64 = 3600;
pub const MAX_STARTUP_RETRIES: u32 = 1000;

fn default_store_timeout() -> u64 {
    5
}

fn default_startup_retries() -> u32 {
    3
}

fn default_startup_backoff() -> u64 {
    2
}

fn default_sample_size() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub url: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Connectivity attempts at startup before giving up.
    #[serde(default = "default_startup_retries")]
    pub startup_retries: u32,
    #[serde(default = "default_startup_backoff")]
    pub startup_backoff_seconds: u64,
    /// Evidence record ids fetched per alerting group.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// ── Indices ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndicesConfig {
    #[serde(default = "default_logs_index")]
    pub logs: String,
    #[serde(default = "default_alerts_index")]
    pub alerts: String,
}

fn default_logs_index() -> String {
    "logs".to_string()
}

fn default_alerts_index() -> String {
    "alerts".to_string()
}

impl Default for IndicesConfig {
    fn default() -> Self {
        Self {
            logs: default_logs_index(),
            alerts: default_alerts_index(),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

/// One year.
pub const MAX_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,
    /// How long shutdown waits for an in-flight cycle.
    #[serde(default = "default_grace")]
    pub shutdown_grace_seconds: u64,
}

fn default_interval() -> u64 {
    1
}

fn default_grace() -> u64 {
    30
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval(),
            shutdown_grace_seconds: default_grace(),
        }
    }
}

// ── Alerting sinks ────────────────────────────────────────────

fn default_sink_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertingConfig {
    #[serde(default)]
    pub file: FileSinkConfig,
    #[serde(default)]
    pub webhook: WebhookSinkConfig,
    #[serde(default)]
    pub alert_store: AlertStoreSinkConfig,
}

impl AlertingConfig {
    pub fn enabled_sink_count(&self) -> usize {
        [self.file.enabled, self.webhook.enabled, self.alert_store.enabled]
            .iter()
            .filter(|e| **e)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSinkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_alert_file")]
    pub path: PathBuf,
    #[serde(default = "default_sink_timeout")]
    pub timeout_seconds: u64,
}

fn default_alert_file() -> PathBuf {
    PathBuf::from("data/alerts.jsonl")
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_alert_file(),
            timeout_seconds: default_sink_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookSinkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_sink_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body_template: Option<String>,
}

impl Default for WebhookSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout_seconds: default_sink_timeout(),
            method: None,
            headers: HashMap::new(),
            body_template: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertStoreSinkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sink_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AlertStoreSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_seconds: default_sink_timeout(),
        }
    }
}
