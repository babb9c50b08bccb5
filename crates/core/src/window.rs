use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WindowError;

/// Longest trailing window a rule may ask for (366 days).
pub const MAX_WINDOW_MINUTES: i64 = 366 * 24 * 60;

/// A closed time range `[start, end]` over which records are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, rejecting `start >= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// The trailing window of `minutes` ending at `end`.
    ///
    /// Lengths above [`MAX_WINDOW_MINUTES`], or that would reach outside the
    /// representable date range, are rejected.
    pub fn trailing(end: DateTime<Utc>, minutes: i64) -> Result<Self, WindowError> {
        if minutes <= 0 {
            return Err(WindowError::NonPositive(minutes));
        }
        if minutes > MAX_WINDOW_MINUTES {
            return Err(WindowError::OutOfRange(minutes));
        }
        let start = Duration::try_minutes(minutes)
            .and_then(|d| end.checked_sub_signed(d))
            .ok_or(WindowError::OutOfRange(minutes))?;
        Self::new(start, end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}
