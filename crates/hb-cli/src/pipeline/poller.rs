//! The fixed-interval poll loop.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use hb_core::distinct_users;

use super::ingest::{IngestReport, Ingester};
use super::summarize::{SummarizeReport, Summarizer};

/// Everything one tick did.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub ingest: IngestReport,
    pub summarize: SummarizeReport,
}

/// Drives ingest → summarize → detect on a fixed interval.
pub struct Poller {
    ingester: Ingester,
    summarizer: Summarizer,
    interval: Duration,
}

impl Poller {
    pub const fn new(ingester: Ingester, summarizer: Summarizer, interval: Duration) -> Self {
        Self {
            ingester,
            summarizer,
            interval,
        }
    }

    /// Runs one full tick.
    ///
    /// Summarizing only runs when at least one record stored. It then covers
    /// every user in the selected batch, including users whose records failed
    /// to store. A batch that stored nothing is reselected next tick, so it
    /// must not trigger fetches.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let ingest = self.ingester.ingest(now)?;
        let summarize = if ingest.stored > 0 {
            let users = distinct_users(&ingest.records);
            self.summarizer.summarize(&users, now).await
        } else {
            SummarizeReport::default()
        };
        Ok(TickReport { ingest, summarize })
    }

    /// Ticks until `shutdown` resolves.
    ///
    /// Shutdown only interrupts the wait between ticks; a tick in progress
    /// always runs to completion. Tick failures are logged and the loop
    /// continues.
    pub async fn run_with_shutdown<S>(&self, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        tracing::info!(interval = ?self.interval, "starting poll loop");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    tracing::info!("shutdown signal received, stopping poll loop");
                    return;
                }

                _ = interval.tick() => {}
            }

            match self.tick(Utc::now()).await {
                Ok(report) => {
                    if report.ingest.count > 0 || !report.summarize.detect.milestones.is_empty() {
                        tracing::info!(
                            heartbeats = report.ingest.count,
                            stored = report.ingest.stored,
                            failed = report.ingest.failed,
                            users = report.summarize.users,
                            milestones = report.summarize.detect.milestones.len(),
                            "poll tick complete"
                        );
                    }
                }
                Err(err) => tracing::error!(error = %format!("{err:#}"), "poll tick failed"),
            }
        }
    }
}
