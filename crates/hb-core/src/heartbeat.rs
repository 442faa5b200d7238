//! Upstream heartbeat records and their validation.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timestamp::{epoch_to_datetime, parse_timestamp};

/// Earliest calendar year accepted for a heartbeat's event time.
pub const MIN_VALID_YEAR: i32 = 2000;
/// Latest calendar year accepted for a heartbeat's event time.
pub const MAX_VALID_YEAR: i32 = 2100;

/// A single coding-activity event recorded by the upstream time tracker.
///
/// Field names follow the upstream activity store's columns. `time` is the
/// event time in fractional epoch seconds, kept exactly as reported so that
/// cursor comparisons never lose precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: i64,
    pub user_id: String,
    pub entity: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub project: Option<String>,
    pub branch: Option<String>,
    pub language: Option<String>,
    pub is_write: Option<bool>,
    pub editor: Option<String>,
    pub operating_system: Option<String>,
    pub machine: Option<String>,
    pub user_agent: Option<String>,
    pub time: f64,
    pub hash: Option<String>,
    pub origin: Option<String>,
    pub origin_id: Option<String>,
    pub created_at: String,
    pub project_root_count: Option<i64>,
    pub line_additions: Option<i64>,
    pub line_deletions: Option<i64>,
    pub lines: Option<i64>,
    pub line_number: Option<i64>,
    pub cursor_position: Option<i64>,
    pub dependencies: Option<String>,
}

/// Per-record validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HeartbeatError {
    /// The event time is not a real calendar date within the accepted range.
    #[error(
        "heartbeat {id} has invalid time {time} (expected a date between {min} and {max})",
        min = MIN_VALID_YEAR,
        max = MAX_VALID_YEAR
    )]
    InvalidTime { id: i64, time: f64 },
    /// The upstream ingestion timestamp could not be parsed.
    #[error("heartbeat {id} has unparseable created_at: {created_at}")]
    InvalidCreatedAt { id: i64, created_at: String },
}

impl Heartbeat {
    /// Returns the event time as a calendar timestamp, validating its range.
    pub fn event_time(&self) -> Result<DateTime<Utc>, HeartbeatError> {
        epoch_to_datetime(self.time)
            .filter(|ts| (MIN_VALID_YEAR..=MAX_VALID_YEAR).contains(&ts.year()))
            .ok_or(HeartbeatError::InvalidTime {
                id: self.id,
                time: self.time,
            })
    }

    /// Returns the upstream ingestion time.
    pub fn ingested_at(&self) -> Result<DateTime<Utc>, HeartbeatError> {
        parse_timestamp(&self.created_at).ok_or_else(|| HeartbeatError::InvalidCreatedAt {
            id: self.id,
            created_at: self.created_at.clone(),
        })
    }

    /// Validates every field the local copy depends on.
    pub fn validate(&self) -> Result<(), HeartbeatError> {
        self.event_time()?;
        self.ingested_at()?;
        Ok(())
    }
}

/// Returns the distinct users present in a batch.
pub fn distinct_users(heartbeats: &[Heartbeat]) -> BTreeSet<String> {
    heartbeats
        .iter()
        .map(|heartbeat| heartbeat.user_id.clone())
        .collect()
}

/// Returns the newest event time in a batch, ignoring records whose time fails
/// validation.
pub fn newest_valid_time(heartbeats: &[Heartbeat]) -> Option<f64> {
    heartbeats
        .iter()
        .filter(|heartbeat| heartbeat.event_time().is_ok())
        .map(|heartbeat| heartbeat.time)
        .reduce(f64::max)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Heartbeat;

    pub fn heartbeat(id: i64, user_id: &str, project: &str, time: f64) -> Heartbeat {
        Heartbeat {
            id,
            user_id: user_id.to_string(),
            entity: format!("/src/{project}/main.rs"),
            kind: Some("file".to_string()),
            category: Some("coding".to_string()),
            project: Some(project.to_string()),
            branch: Some("main".to_string()),
            language: Some("Rust".to_string()),
            is_write: Some(true),
            editor: Some("vscode".to_string()),
            operating_system: Some("linux".to_string()),
            machine: Some("devbox".to_string()),
            user_agent: Some("wakatime/v1.0".to_string()),
            time,
            hash: Some(format!("hash-{id}")),
            origin: None,
            origin_id: None,
            created_at: "2025-01-15T10:30:00Z".to_string(),
            project_root_count: Some(3),
            line_additions: Some(2),
            line_deletions: Some(1),
            lines: Some(120),
            line_number: Some(42),
            cursor_position: Some(7),
            dependencies: None,
        }
    }
}
