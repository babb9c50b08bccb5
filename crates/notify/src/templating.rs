//! Minijinja rendering for webhook body templates.
//!
//! Templates see the alert under `alert` (every field of the event) and the
//! render time under `now`. Templates are arbitrary strings from config, so
//! a fresh [`minijinja::Environment`] is built per call.

use chrono::{SecondsFormat, Utc};
use logwatch_core::AlertEvent;
use minijinja::{Error, ErrorKind, Value};

use crate::traits::NotifyError;

/// Context data available to body templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext<'a> {
    pub alert: &'a AlertEvent,
    /// Render time, RFC 3339.
    pub now: String,
}

impl<'a> TemplateContext<'a> {
    pub fn for_alert(alert: &'a AlertEvent) -> Self {
        Self {
            alert,
            now: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Renders alert templates using minijinja.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);
        env.add_filter("json", json_filter);
        env.add_function("env", env_function);
        env
    }

    /// Render `template_str` against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, ctx: &TemplateContext<'_>) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Check template syntax without evaluating it.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Serialize any value as JSON, so string fields can be embedded in a JSON
/// body with correct quoting.
fn json_filter(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

/// Global function: read an environment variable, empty when unset.
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "environment variable not found, rendering empty string");
            String::new()
        }
    }
}
