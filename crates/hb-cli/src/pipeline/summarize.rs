//! Summary snapshots for recently active users.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use hb_core::{CredentialDirectory, SummaryFetcher};
use hb_db::Database;

use super::detect::{DetectReport, MilestoneDetector};

/// Outcome of one summarize cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummarizeReport {
    pub users: usize,
    pub snapshots: usize,
    /// Users without an API key on file.
    pub skipped: usize,
    pub failed: usize,
    pub detect: DetectReport,
}

/// Fetches all-time summaries, snapshots them, and hands them to the detector.
///
/// Snapshot writes call the blocking `rusqlite` handle on the runtime thread.
/// Each is a single short statement and the poller is the only writer.
pub struct Summarizer {
    db: Arc<Database>,
    credentials: Arc<dyn CredentialDirectory>,
    fetcher: Arc<dyn SummaryFetcher>,
    detector: MilestoneDetector,
}

impl Summarizer {
    pub fn new(
        db: Arc<Database>,
        credentials: Arc<dyn CredentialDirectory>,
        fetcher: Arc<dyn SummaryFetcher>,
        detector: MilestoneDetector,
    ) -> Self {
        Self {
            db,
            credentials,
            fetcher,
            detector,
        }
    }

    /// Processes each user independently; one user's failure never affects
    /// another's.
    pub async fn summarize(&self, user_ids: &BTreeSet<String>, now: DateTime<Utc>) -> SummarizeReport {
        let mut report = SummarizeReport {
            users: user_ids.len(),
            ..SummarizeReport::default()
        };

        for user_id in user_ids {
            let api_key = match self.credentials.api_key(user_id) {
                Ok(Some(api_key)) => api_key,
                Ok(None) => {
                    report.skipped += 1;
                    tracing::debug!(user_id = %user_id, "no API key on file, skipping");
                    continue;
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(user_id = %user_id, error = %err, "failed to look up API key");
                    continue;
                }
            };

            let summary = match self.fetcher.fetch_summary(&api_key).await {
                Ok(summary) => summary,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(user_id = %user_id, error = %err, "failed to fetch summary");
                    continue;
                }
            };

            match self.db.insert_snapshot(user_id, &summary, now) {
                Ok(snapshot) => {
                    report.snapshots += 1;
                    tracing::debug!(
                        user_id = %user_id,
                        snapshot = %snapshot.id,
                        total = summary.total_seconds(),
                        "stored summary snapshot"
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(user_id = %user_id, error = %err, "failed to store summary snapshot");
                }
            }

            let detected = self.detector.detect_and_notify(user_id, &summary, now).await;
            report.detect.absorb(detected);
        }

        report
    }
}
