//! Fixed-interval scheduling of detection cycles.
//!
//! The [`IntervalScheduler`] fires a [`Cycle`] once per interval. At most one
//! cycle is in flight: a tick that arrives while the previous cycle is still
//! running is skipped with a warning. Cancellation stops new ticks and gives
//! the in-flight cycle a grace period to finish before it is aborted.
//!
//! The scheduler knows nothing about rules or sinks. The server crate wires
//! evaluation and dispatch into a [`Cycle`] implementation.

mod core;
mod cycle;
mod state;


pub use self::core::{IntervalScheduler, SchedulerError, SchedulerSummary};
pub use self::cycle::{Cycle, CycleReport};
pub use self::state::SchedulerState;
