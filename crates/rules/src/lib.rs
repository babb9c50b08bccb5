//! Detection rules and the machinery that runs them.
//!
//! This crate provides:
//! - Rule kinds with their severity and evaluation strategy
//! - Rule-set construction that turns bad rules into warnings, not failures
//! - The [`query::LogQuery`] adapter trait plus an in-memory implementation
//! - The grouped-threshold evaluator producing alert events
//! - An interval scheduler running detection cycles with cooperative cancellation

pub mod evaluator;
pub mod query;
pub mod scheduler;
pub mod schema;
pub mod validation;

pub use evaluator::RuleEvaluator;
pub use query::{AggregateQuery, GroupBucket, GroupCounts, LogQuery, QueryError};
pub use scheduler::{Cycle, CycleReport, IntervalScheduler, SchedulerError, SchedulerState};
pub use schema::{ActiveRule, DetectionStrategy, RuleKind};
pub use validation::{RuleConfigWarning, RuleSet};
