//! Leaderboards reconstructed from summary snapshots.
//!
//! Upstream totals are cumulative, so activity inside a window is the
//! difference between the smallest and largest snapshot recorded in it.
//! Snapshots are compared by value rather than by insertion order to stay
//! correct if they were written out of order.
//!
//! The upstream API has no per-project language breakdown. Every language
//! that grew in the window is attributed to every project in the latest
//! snapshot, so the displayed language is approximate.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rayon::prelude::*;
use thiserror::Error;

use crate::duration::format_duration;
use crate::summary::Summary;

/// Placeholder language names that are never displayed as a main language.
pub const IGNORED_LANGUAGES: [&str; 4] = ["unknown", "AUTO_DETECTED", "PLAIN_TEXT", "Text"];

const FALLBACK_LANGUAGE: &str = "unknown";
const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Leaderboard time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Period {
    #[default]
    Day,
    Week,
}

impl Period {
    /// Start of the window ending at `now`: midnight UTC today, or seven days back.
    pub fn window_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Day => now.date_naive().and_time(NaiveTime::MIN).and_utc(),
            Self::Week => now - Duration::days(7),
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Day => "today",
            Self::Week => "the past week",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
        }
    }
}

/// Error for unrecognised period or limit text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaderboardArgError {
    #[error("unknown period: {0} (expected day or week)")]
    UnknownPeriod(String),
    #[error("invalid limit: {0} (expected a positive number or all)")]
    InvalidLimit(String),
}

impl FromStr for Period {
    type Err = LeaderboardArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "today" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            _ => Err(LeaderboardArgError::UnknownPeriod(s.to_string())),
        }
    }
}

/// How many ranked users to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Top(usize),
    All,
}

impl Limit {
    fn truncate<T>(self, entries: &mut Vec<T>) {
        if let Self::Top(count) = self {
            entries.truncate(count);
        }
    }
}

impl FromStr for Limit {
    type Err = LeaderboardArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        match s.parse::<usize>() {
            Ok(count) if count > 0 => Ok(Self::Top(count)),
            _ => Err(LeaderboardArgError::InvalidLimit(s.to_string())),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top(count) => write!(f, "{count}"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Seconds spent on one project inside the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectActivity {
    pub project: String,
    pub language: String,
    pub seconds: i64,
}

impl ProjectActivity {
    pub const fn minutes(&self) -> i64 {
        self.seconds / 60
    }
}

/// One user's incremental activity inside the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActivity {
    pub user_id: String,
    pub total_seconds: i64,
    pub projects: Vec<ProjectActivity>,
}

impl UserActivity {
    pub const fn minutes(&self) -> i64 {
        self.total_seconds / 60
    }
}

/// Reconstructs a user's activity from the snapshots recorded in a window.
///
/// Returns `None` when there are fewer than two snapshots or no positive
/// growth between the smallest and largest one.
pub fn diff_snapshots(user_id: &str, snapshots: &[Summary]) -> Option<UserActivity> {
    if snapshots.len() < 2 {
        return None;
    }
    let min = snapshots.iter().min_by_key(|summary| summary.total_seconds())?;
    // Reversed so the earliest of several equal maxima wins.
    let max = snapshots
        .iter()
        .rev()
        .max_by_key(|summary| summary.total_seconds())?;

    let total_seconds = max.total_seconds() - min.total_seconds();
    if total_seconds <= 0 {
        return None;
    }

    let languages = attribute_languages(min, max);
    let mut projects: Vec<ProjectActivity> = max
        .projects
        .iter()
        .filter_map(|item| {
            let seconds = item.total - min.project_total(&item.key).unwrap_or(0);
            (seconds > 0).then(|| ProjectActivity {
                project: item.key.clone(),
                language: main_language(languages.get(&item.key)),
                seconds,
            })
        })
        .collect();
    projects.sort_by(|a, b| {
        b.minutes()
            .cmp(&a.minutes())
            .then_with(|| a.project.cmp(&b.project))
    });

    Some(UserActivity {
        user_id: user_id.to_string(),
        total_seconds,
        projects,
    })
}

/// Associates every language that grew in the window with every project in
/// the latest snapshot.
fn attribute_languages(min: &Summary, max: &Summary) -> BTreeMap<String, BTreeSet<String>> {
    let grown: BTreeSet<String> = max
        .languages
        .iter()
        .filter(|item| item.total - min.language_total(&item.key).unwrap_or(0) > 0)
        .map(|item| item.key.clone())
        .collect();
    max.projects
        .iter()
        .map(|item| (item.key.clone(), grown.clone()))
        .collect()
}

fn main_language(languages: Option<&BTreeSet<String>>) -> String {
    languages
        .and_then(|set| {
            set.iter()
                .find(|language| !IGNORED_LANGUAGES.contains(&language.as_str()))
        })
        .cloned()
        .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string())
}

/// Diffs every user's snapshots, then ranks and truncates.
pub fn aggregate(users: &[(String, Vec<Summary>)], limit: Limit) -> Vec<UserActivity> {
    let mut ranked: Vec<UserActivity> = users
        .par_iter()
        .filter_map(|(user_id, snapshots)| diff_snapshots(user_id, snapshots))
        .collect();
    ranked.sort_by(|a, b| {
        b.minutes()
            .cmp(&a.minutes())
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    limit.truncate(&mut ranked);
    tracing::debug!(
        users = users.len(),
        ranked = ranked.len(),
        %limit,
        "aggregated leaderboard"
    );
    ranked
}

/// Renders ranked entries as a chat message.
pub fn render(period: Period, entries: &[UserActivity]) -> String {
    if entries.is_empty() {
        return format!("No coding activity recorded for {} yet.", period.label());
    }

    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(format!("*Coding leaderboard for {}*", period.label()));
    for (index, entry) in entries.iter().enumerate() {
        let marker = MEDALS
            .get(index)
            .map_or_else(|| format!("{}.", index + 1), |medal| (*medal).to_string());
        let breakdown = entry
            .projects
            .iter()
            .filter(|project| project.minutes() > 0)
            .map(|project| {
                format!(
                    "{} [{}]: {}m",
                    project.project,
                    project.language,
                    project.minutes()
                )
            })
            .collect::<Vec<_>>()
            .join(" + ");

        let line = format!(
            "{marker} <@{}>: {}",
            entry.user_id,
            format_duration(entry.total_seconds)
        );
        if breakdown.is_empty() {
            lines.push(line);
        } else {
            lines.push(format!("{line} ({breakdown})"));
        }
    }
    lines.join("\n")
}
