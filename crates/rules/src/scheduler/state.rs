//! Observable scheduler state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What the scheduler is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    #[default]
    Idle,
    Running {
        cycle: u64,
        started_at: DateTime<Utc>,
    },
}

impl SchedulerState {
    pub fn is_running(&self) -> bool {
        matches!(self, SchedulerState::Running { .. })
    }

    /// Cycle number currently in flight, if any.
    pub fn cycle(&self) -> Option<u64> {
        match self {
            SchedulerState::Idle => None,
            SchedulerState::Running { cycle, .. } => Some(*cycle),
        }
    }
}
