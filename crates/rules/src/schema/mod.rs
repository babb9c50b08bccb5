//! Detection rule types.
//!
//! - `RuleKind`: the closed set of rule kinds with their severity and strategy
//! - `ActiveRule`: a validated, enabled rule ready for evaluation
//! - filter helpers shared by query adapters

mod active;
mod filters;
mod kind;

pub use active::*;
pub use filters::*;
pub use kind::*;
