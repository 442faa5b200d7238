//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use hb_core::{Limit, NotificationPeriod};

use crate::pipeline::PipelineSettings;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the local state database.
    pub database_path: PathBuf,
    /// Path to the upstream activity store (opened read-only).
    pub upstream_database_path: PathBuf,
    /// Base URL of the summary API.
    pub summary_api_url: String,
    /// Base URL of the chat API.
    pub chat_api_url: String,
    /// Bot token for the chat API.
    pub chat_token: Option<String>,
    pub poll_interval_secs: u64,
    pub retention_hours: i64,
    pub notification_period_secs: i64,
    pub bootstrap_limit: usize,
    pub snapshot_retention_days: i64,
    pub default_leaderboard_limit: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("upstream_database_path", &self.upstream_database_path)
            .field("summary_api_url", &self.summary_api_url)
            .field("chat_api_url", &self.chat_api_url)
            .field(
                "chat_token",
                &self.chat_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("retention_hours", &self.retention_hours)
            .field("notification_period_secs", &self.notification_period_secs)
            .field("bootstrap_limit", &self.bootstrap_limit)
            .field("snapshot_retention_days", &self.snapshot_retention_days)
            .field("default_leaderboard_limit", &self.default_leaderboard_limit)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("hb.db"),
            upstream_database_path: data_dir.join("upstream.db"),
            summary_api_url: "https://waka.hackclub.com".to_string(),
            chat_api_url: "https://slack.com/api".to_string(),
            chat_token: None,
            poll_interval_secs: 5,
            retention_hours: 24,
            notification_period_secs: 3600,
            bootstrap_limit: 1000,
            snapshot_retention_days: 8,
            default_leaderboard_limit: 10,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (HB_*)
        figment = figment.merge(Env::prefixed("HB_"));

        figment.extract()
    }

    /// Validates the numeric settings and converts them for the pipeline.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        ensure!(
            self.poll_interval_secs > 0,
            "poll_interval_secs must be positive"
        );
        ensure!(self.bootstrap_limit > 0, "bootstrap_limit must be positive");
        let notification_period = NotificationPeriod::new(self.notification_period_secs)
            .context("invalid notification_period_secs")?;
        let retention = positive_delta(TimeDelta::try_hours(self.retention_hours))
            .context("retention_hours must be a positive number of hours")?;
        let snapshot_retention = positive_delta(TimeDelta::try_days(self.snapshot_retention_days))
            .context("snapshot_retention_days must be a positive number of days")?;

        Ok(PipelineSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            retention,
            snapshot_retention,
            bootstrap_limit: self.bootstrap_limit,
            notification_period,
        })
    }

    /// Leaderboard size used when a request names none.
    pub fn default_limit(&self) -> Result<Limit> {
        ensure!(
            self.default_leaderboard_limit > 0,
            "default_leaderboard_limit must be positive"
        );
        Ok(Limit::Top(self.default_leaderboard_limit))
    }

    /// Returns the chat token, rejecting a missing or blank one.
    pub fn require_chat_token(&self) -> Result<&str> {
        self.chat_token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing chat token (set HB_CHAT_TOKEN or config.toml)"))
    }
}

fn positive_delta(delta: Option<TimeDelta>) -> Option<TimeDelta> {
    delta.filter(|delta| *delta > TimeDelta::zero())
}

/// Returns the platform-specific config directory for hb.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hb"))
}

/// Returns the platform-specific data directory for hb.
///
/// On Linux: `~/.local/share/hb`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("hb"))
}
