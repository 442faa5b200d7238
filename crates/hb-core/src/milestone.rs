//! Per-project milestone detection.
//!
//! Every (user, project) pair is either untracked or tracked against a
//! watermark: the cumulative seconds recorded at the last notification, or at
//! first sight if no notification has fired yet.
//!
//! # Algorithm Summary
//!
//! 1. First observation: record the observed total as the baseline, fire nothing.
//! 2. Later observations: `periods = floor((total - baseline) / period)`.
//! 3. When `periods >= 1`, fire once and advance the baseline by
//!    `periods * period` so the sub-period remainder carries over.
//! 4. A total at or below the baseline never moves it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::duration::format_duration;

/// Stored notification watermark for one (user, project) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub user_id: String,
    pub project: String,
    pub last_notified_at: DateTime<Utc>,
    pub last_total_seconds: i64,
}

/// Seconds of new coding required for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPeriod(i64);

/// Returned when a notification period is not a positive number of seconds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification period must be positive, got {0} seconds")]
pub struct InvalidPeriod(pub i64);

impl NotificationPeriod {
    pub const fn new(seconds: i64) -> Result<Self, InvalidPeriod> {
        if seconds > 0 {
            Ok(Self(seconds))
        } else {
            Err(InvalidPeriod(seconds))
        }
    }

    pub const fn seconds(self) -> i64 {
        self.0
    }
}

impl Default for NotificationPeriod {
    fn default() -> Self {
        Self(3600)
    }
}

impl fmt::Display for NotificationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Outcome of comparing an observed total against a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No watermark existed; start tracking from the observed total.
    StartTracking { baseline: i64 },
    /// One or more whole periods elapsed since the baseline.
    Reached {
        periods: i64,
        elapsed_seconds: i64,
        new_baseline: i64,
    },
    /// Not enough progress, or the total went backwards.
    NoProgress,
}

/// Decides what to do with a project's observed cumulative total.
pub fn decide(baseline: Option<i64>, total: i64, period: NotificationPeriod) -> Decision {
    let Some(baseline) = baseline else {
        return Decision::StartTracking { baseline: total };
    };
    let delta = total - baseline;
    if delta <= 0 {
        return Decision::NoProgress;
    }
    let periods = delta / period.seconds();
    if periods < 1 {
        return Decision::NoProgress;
    }
    let elapsed_seconds = periods * period.seconds();
    Decision::Reached {
        periods,
        elapsed_seconds,
        new_baseline: baseline + elapsed_seconds,
    }
}

/// A fired milestone, ready to be rendered and delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub user_id: String,
    pub project: String,
    pub periods: i64,
    pub elapsed_seconds: i64,
    pub total_seconds: i64,
}

impl Milestone {
    /// Renders the celebratory chat message.
    pub fn message(&self) -> String {
        format!(
            ":tada: <@{}> just coded another {} on *{}*! That's {} in total.",
            self.user_id,
            format_duration(self.elapsed_seconds),
            self.project,
            format_duration(self.total_seconds),
        )
    }
}
