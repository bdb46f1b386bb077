//! Poll cadence for continuous mode.
//!
//! Each deadline is the previous deadline plus the interval, counted from
//! the first cycle's start. A cycle that overruns its slot eats into the
//! next gap rather than shifting every later cycle.

use chrono::{DateTime, Local};
use std::time::Duration;

use crate::clock::Clock;
use crate::error::SyncError;

/// Fixed-cadence deadlines.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: chrono::Duration,
    next_deadline: DateTime<Local>,
}

impl PollSchedule {
    /// Schedule whose first deadline is `first_start + interval`.
    ///
    /// # Errors
    /// Returns `SyncError::InvalidConfig` for a zero or out-of-range interval.
    pub fn new(first_start: DateTime<Local>, interval: Duration) -> Result<Self, SyncError> {
        let interval = chrono::Duration::from_std(interval)
            .ok()
            .filter(|d| *d > chrono::Duration::zero())
            .ok_or_else(|| SyncError::InvalidConfig {
                reason: format!("unusable poll interval {:?}", interval),
            })?;
        let next_deadline = first_start
            .checked_add_signed(interval)
            .ok_or_else(|| SyncError::InvalidConfig {
                reason: "poll interval overflows the calendar".to_string(),
            })?;
        Ok(PollSchedule {
            interval,
            next_deadline,
        })
    }

    pub fn next_deadline(&self) -> DateTime<Local> {
        self.next_deadline
    }

    /// Time left until the next deadline, or None if it has passed.
    pub fn time_until_due(&self, now: DateTime<Local>) -> Option<Duration> {
        if now >= self.next_deadline {
            return None;
        }
        (self.next_deadline - now).to_std().ok()
    }

    /// Move to the following deadline.
    pub fn advance(&mut self) {
        self.next_deadline = self.next_deadline + self.interval;
    }

    /// Block until the next deadline, then advance past it.
    ///
    /// `sleep` is called with the remaining time until the clock reports the
    /// deadline reached.
    pub fn wait<F: FnMut(Duration)>(&mut self, clock: &dyn Clock, mut sleep: F) {
        while let Some(remaining) = self.time_until_due(clock.now()) {
            sleep(remaining);
        }
        self.advance();
    }
}
