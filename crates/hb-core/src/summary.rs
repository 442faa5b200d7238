//! Cumulative activity summaries returned by the upstream summary API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative seconds for one project or language key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryItem {
    pub key: String,
    pub total: i64,
}

impl SummaryItem {
    pub fn new(key: impl Into<String>, total: i64) -> Self {
        Self {
            key: key.into(),
            total,
        }
    }
}

/// All-time totals per project and per language for a single user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub projects: Vec<SummaryItem>,
    #[serde(default)]
    pub languages: Vec<SummaryItem>,
}

impl Summary {
    /// Sum of cumulative seconds across all projects.
    pub fn total_seconds(&self) -> i64 {
        self.projects.iter().map(|item| item.total).sum()
    }

    pub fn project_total(&self, key: &str) -> Option<i64> {
        find_total(&self.projects, key)
    }

    pub fn language_total(&self, key: &str) -> Option<i64> {
        find_total(&self.languages, key)
    }
}

fn find_total(items: &[SummaryItem], key: &str) -> Option<i64> {
    items.iter().find(|item| item.key == key).map(|item| item.total)
}

/// An immutable, point-in-time copy of a user's summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySnapshot {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub summary: Summary,
}
