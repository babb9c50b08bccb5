//! Alert delivery for the detector.
//!
//! This crate provides:
//! - `AlertSink` trait for pluggable delivery targets
//! - File, webhook, and alert-store sink implementations
//! - Minijinja rendering for webhook body templates
//! - Dispatcher that fans an alert out to every enabled sink

pub mod alert_store;
pub mod dispatcher;
pub mod file;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use alert_store::{AlertIndexWriter, AlertStoreSink, IndexWrite};
pub use dispatcher::Dispatcher;
pub use file::FileSink;
pub use templating::TemplateRenderer;
pub use traits::{probe_alert, AlertSink, NotifyError};
pub use webhook::WebhookSink;
