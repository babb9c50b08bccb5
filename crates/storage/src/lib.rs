//! OpenSearch-compatible storage access for the detector.
//!
//! - [`SearchClient`]: HTTP client bound to the logs and alerts indices
//! - `LogQuery` over the logs index (terms aggregation per group)
//! - `AlertIndexWriter` over the alerts index (create-only writes)
//! - read contracts: alert search and recent raw logs

pub mod alerts;
pub mod client;
pub mod error;
pub mod logs;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use alerts::AlertQuery;
pub use client::SearchClient;
pub use error::StorageError;
