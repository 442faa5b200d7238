//! Milestone detection and notification fan-out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use hb_core::milestone::decide;
use hb_core::{Decision, Milestone, NotificationPeriod, Notifier, Summary, Watermark};
use hb_db::Database;

/// Outcome of checking one user's summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectReport {
    /// Projects seen for the first time.
    pub started: usize,
    pub milestones: Vec<Milestone>,
    pub sent: usize,
    pub failed_sends: usize,
    /// Watermark or preference lookups that failed.
    pub errors: usize,
}

impl DetectReport {
    pub(crate) fn absorb(&mut self, other: Self) {
        self.started += other.started;
        self.milestones.extend(other.milestones);
        self.sent += other.sent;
        self.failed_sends += other.failed_sends;
        self.errors += other.errors;
    }
}

/// Compares cumulative project totals against stored watermarks.
///
/// Watermark reads and writes are blocking `rusqlite` calls made between
/// awaits; no database guard is held across a send.
pub struct MilestoneDetector {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    period: NotificationPeriod,
}

impl MilestoneDetector {
    pub fn new(db: Arc<Database>, notifier: Arc<dyn Notifier>, period: NotificationPeriod) -> Self {
        Self {
            db,
            notifier,
            period,
        }
    }

    /// Advances watermarks for every project in `summary` and announces any
    /// milestones in the user's enabled channels.
    ///
    /// Watermarks are advanced before delivery; a failed send is logged and
    /// never rolls one back.
    pub async fn detect_and_notify(
        &self,
        user_id: &str,
        summary: &Summary,
        now: DateTime<Utc>,
    ) -> DetectReport {
        let mut report = DetectReport::default();

        for project in &summary.projects {
            let baseline = match self.db.watermark(user_id, &project.key) {
                Ok(watermark) => watermark.map(|w| w.last_total_seconds),
                Err(err) => {
                    report.errors += 1;
                    tracing::warn!(user_id, project = %project.key, error = %err, "failed to read watermark");
                    continue;
                }
            };

            match decide(baseline, project.total, self.period) {
                Decision::StartTracking { baseline } => {
                    let watermark = Watermark {
                        user_id: user_id.to_string(),
                        project: project.key.clone(),
                        last_notified_at: now,
                        last_total_seconds: baseline,
                    };
                    match self.db.insert_watermark(&watermark) {
                        Ok(_) => {
                            report.started += 1;
                            tracing::debug!(user_id, project = %project.key, baseline, "tracking new project");
                        }
                        Err(err) => {
                            report.errors += 1;
                            tracing::warn!(user_id, project = %project.key, error = %err, "failed to create watermark");
                        }
                    }
                }
                Decision::Reached {
                    periods,
                    elapsed_seconds,
                    new_baseline,
                } => match self
                    .db
                    .advance_watermark(user_id, &project.key, new_baseline, now)
                {
                    Ok(true) => {
                        tracing::info!(
                            user_id,
                            project = %project.key,
                            periods,
                            total = project.total,
                            "milestone reached"
                        );
                        report.milestones.push(Milestone {
                            user_id: user_id.to_string(),
                            project: project.key.clone(),
                            periods,
                            elapsed_seconds,
                            total_seconds: project.total,
                        });
                    }
                    Ok(false) => {
                        tracing::debug!(user_id, project = %project.key, "watermark already advanced");
                    }
                    Err(err) => {
                        report.errors += 1;
                        tracing::warn!(user_id, project = %project.key, error = %err, "failed to advance watermark");
                    }
                },
                Decision::NoProgress => {}
            }
        }

        if !report.milestones.is_empty() {
            self.deliver(user_id, &mut report).await;
        }
        report
    }

    async fn deliver(&self, user_id: &str, report: &mut DetectReport) {
        let channels = match self.db.enabled_channels(user_id) {
            Ok(channels) => channels,
            Err(err) => {
                report.errors += 1;
                tracing::warn!(user_id, error = %err, "failed to load notification channels");
                return;
            }
        };
        if channels.is_empty() {
            tracing::debug!(user_id, "no channels enabled, milestones not announced");
            return;
        }

        for milestone in &report.milestones {
            let text = milestone.message();
            for channel in &channels {
                match self.notifier.send(channel, &text).await {
                    Ok(()) => report.sent += 1,
                    Err(err) => {
                        report.failed_sends += 1;
                        tracing::warn!(user_id, channel = %channel, error = %err, "failed to send milestone");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fakes::{RecordingNotifier, now, summary};

    fn setup(notifier: RecordingNotifier) -> (Arc<Database>, Arc<RecordingNotifier>, MilestoneDetector) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(notifier);
        let detector = MilestoneDetector::new(
            db.clone(),
            notifier.clone(),
            NotificationPeriod::default(),
        );
        (db, notifier, detector)
    }

    fn seed(db: &Database, project: &str, total: i64) {
        db.insert_watermark(&Watermark {
            user_id: "U1".to_string(),
            project: project.to_string(),
            last_notified_at: now(),
            last_total_seconds: total,
        })
        .unwrap();
    }

    #[tokio::test]
    async fn first_observation_creates_watermark_without_notifying() {
        let (db, notifier, detector) = setup(RecordingNotifier::default());
        db.set_preference("U1", "C1", true, now()).unwrap();

        let report = detector
            .detect_and_notify("U1", &summary(&[("site", 50_000)]), now())
            .await;

        assert_eq!(report.started, 1);
        assert!(report.milestones.is_empty());
        assert!(notifier.sent().is_empty());
        let watermark = db.watermark("U1", "site").unwrap().unwrap();
        assert_eq!(watermark.last_total_seconds, 50_000);
    }

    #[tokio::test]
    async fn milestone_advances_by_whole_periods_and_notifies() {
        let (db, notifier, detector) = setup(RecordingNotifier::default());
        db.set_preference("U1", "C1", true, now()).unwrap();
        seed(&db, "site", 3000);

        let report = detector
            .detect_and_notify("U1", &summary(&[("site", 8000)]), now())
            .await;

        assert_eq!(report.milestones.len(), 1);
        assert_eq!(report.milestones[0].elapsed_seconds, 3600);
        assert_eq!(report.sent, 1);
        assert_eq!(
            db.watermark("U1", "site")
                .unwrap()
                .unwrap()
                .last_total_seconds,
            6600
        );
        insta::assert_snapshot!(notifier.sent()[0].1, @":tada: <@U1> just coded another 1h 0m on *site*! That's 2h 13m in total.");
    }

    #[tokio::test]
    async fn non_positive_delta_changes_nothing() {
        let (db, notifier, detector) = setup(RecordingNotifier::default());
        db.set_preference("U1", "C1", true, now()).unwrap();
        seed(&db, "site", 6600);

        for total in [6600, 4000, 6600 + 3599] {
            let report = detector
                .detect_and_notify("U1", &summary(&[("site", total)]), now())
                .await;
            assert!(report.milestones.is_empty());
        }

        assert!(notifier.sent().is_empty());
        assert_eq!(
            db.watermark("U1", "site")
                .unwrap()
                .unwrap()
                .last_total_seconds,
            6600
        );
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_suppress_others() {
        let (db, notifier, detector) = setup(RecordingNotifier::failing_on(&["C1"]));
        db.set_preference("U1", "C1", true, now()).unwrap();
        db.set_preference("U1", "C2", true, now()).unwrap();
        db.set_preference("U1", "C3", false, now()).unwrap();
        seed(&db, "site", 0);

        let report = detector
            .detect_and_notify("U1", &summary(&[("site", 7300)]), now())
            .await;

        assert_eq!(report.sent, 1);
        assert_eq!(report.failed_sends, 1);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "C2");
        assert_eq!(
            db.watermark("U1", "site")
                .unwrap()
                .unwrap()
                .last_total_seconds,
            7200
        );
    }

    #[tokio::test]
    async fn milestone_without_enabled_channels_still_advances() {
        let (db, notifier, detector) = setup(RecordingNotifier::default());
        seed(&db, "site", 0);

        let report = detector
            .detect_and_notify("U1", &summary(&[("site", 3600)]), now())
            .await;

        assert_eq!(report.milestones.len(), 1);
        assert_eq!(report.sent, 0);
        assert!(notifier.sent().is_empty());
        assert_eq!(
            db.watermark("U1", "site")
                .unwrap()
                .unwrap()
                .last_total_seconds,
            3600
        );
    }

    #[tokio::test]
    async fn projects_are_tracked_independently() {
        let (db, _notifier, detector) = setup(RecordingNotifier::default());
        seed(&db, "site", 0);

        let report = detector
            .detect_and_notify("U1", &summary(&[("site", 3600), ("api", 9000)]), now())
            .await;

        assert_eq!(report.started, 1);
        assert_eq!(report.milestones.len(), 1);
        assert_eq!(report.milestones[0].project, "site");
        assert_eq!(
            db.watermark("U1", "api").unwrap().unwrap().last_total_seconds,
            9000
        );
    }
}
