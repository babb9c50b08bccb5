//! Core types for the query adapter.

use std::collections::BTreeMap;
use std::time::Duration;

use logwatch_core::rule::MatchFilter;
use logwatch_core::{is_schema_field, RecordId, TimeWindow, WindowError};

/// Abstraction over the log store's aggregation API.
///
/// Implementations are read-only and must not retry internally; a failed
/// query is retried by the next detection cycle.
#[async_trait::async_trait]
pub trait LogQuery: Send + Sync {
    /// Count records matching `query.filter` inside `query.window`, grouped
    /// by `query.group_by`. Groups with no records are absent from the result.
    async fn aggregate(&self, query: &AggregateQuery) -> Result<GroupCounts, QueryError>;
}

/// One aggregation request.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub filter: MatchFilter,
    pub group_by: String,
    pub window: TimeWindow,
    /// Record ids to return per group as evidence (0 = none).
    pub sample_size: usize,
}

impl AggregateQuery {
    /// Reject fields the log schema does not define.
    pub fn validate(&self) -> Result<(), QueryError> {
        if !is_schema_field(&self.group_by) {
            return Err(QueryError::UnknownField(self.group_by.clone()));
        }
        if let Some(field) = self.filter.keys().find(|f| !is_schema_field(f)) {
            return Err(QueryError::UnknownField(field.clone()));
        }
        Ok(())
    }
}

/// Count and evidence for one group value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupBucket {
    pub count: u64,
    pub sample_refs: Vec<RecordId>,
}

impl GroupBucket {
    pub fn with_count(count: u64) -> Self {
        Self {
            count,
            sample_refs: Vec::new(),
        }
    }
}

/// Group value → bucket. Ordered so that evaluation output is deterministic.
pub type GroupCounts = BTreeMap<String, GroupBucket>;

/// Errors raised by a query adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("log store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("log store query timed out after {0:?}")]
    QueryTimeout(Duration),

    #[error("log store rejected query ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("malformed log store response: {0}")]
    MalformedResponse(String),

    #[error("field '{0}' is not part of the log schema")]
    UnknownField(String),

    #[error("invalid query window: {0}")]
    InvalidWindow(#[from] WindowError),
}

impl QueryError {
    /// Whether the next cycle can be expected to succeed without a config change.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::StoreUnavailable(_) | QueryError::QueryTimeout(_))
    }
}
