//! The polling pipeline: ingest, summarize, detect and notify.
//!
//! Each service holds its database handle and external capabilities behind
//! `Arc`s, so the same instances are shared by the poll loop and by tests
//! that substitute fakes for the upstream store and HTTP clients.

mod detect;
mod ingest;
mod poller;
mod summarize;

use std::time::Duration;

use chrono::TimeDelta;

use hb_core::NotificationPeriod;

pub use detect::{DetectReport, MilestoneDetector};
pub use ingest::{Gap, IngestReport, Ingester};
pub use poller::{Poller, TickReport};
pub use summarize::{SummarizeReport, Summarizer};

/// Tunables shared by the pipeline services.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub poll_interval: Duration,
    /// Age after which synced heartbeats are purged and a cursor counts as stale.
    pub retention: TimeDelta,
    pub snapshot_retention: TimeDelta,
    pub bootstrap_limit: usize,
    pub notification_period: NotificationPeriod,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            retention: TimeDelta::hours(24),
            snapshot_retention: TimeDelta::days(8),
            bootstrap_limit: 1000,
            notification_period: NotificationPeriod::default(),
        }
    }
}
