//! Cursor-based heartbeat ingestion.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use hb_core::timestamp::datetime_to_epoch;
use hb_core::{Heartbeat, HeartbeatSource, newest_valid_time};
use hb_db::Database;

use super::PipelineSettings;

/// Upstream time range skipped when a stale cursor was re-bootstrapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gap {
    pub from: f64,
    pub to: f64,
}

/// Outcome of one ingest cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Every record selected from upstream, including ones that failed to store.
    #[serde(skip)]
    pub records: Vec<Heartbeat>,
    pub count: usize,
    pub stored: usize,
    pub failed: usize,
    /// Cursor value after the cycle.
    pub cursor: Option<f64>,
    pub gap: Option<Gap>,
    pub purged_heartbeats: usize,
    pub purged_snapshots: usize,
}

/// Pulls new heartbeats from upstream and mirrors them locally.
pub struct Ingester {
    db: Arc<Database>,
    source: Arc<dyn HeartbeatSource>,
    settings: PipelineSettings,
}

impl Ingester {
    pub fn new(
        db: Arc<Database>,
        source: Arc<dyn HeartbeatSource>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            source,
            settings,
        }
    }

    /// Runs one ingest cycle.
    ///
    /// An upstream failure aborts the cycle before anything is stored, leaving
    /// the cursor where it was. Per-record failures are counted and logged.
    pub fn ingest(&self, now: DateTime<Utc>) -> Result<IngestReport> {
        let cursor = self.db.cursor().context("failed to read cursor")?;
        let stale_before = datetime_to_epoch(now - self.settings.retention);

        let (records, gap) = match cursor {
            None => {
                tracing::info!(
                    limit = self.settings.bootstrap_limit,
                    "no cursor, bootstrapping from most recent heartbeats"
                );
                let records = self
                    .source
                    .recent_heartbeats(self.settings.bootstrap_limit)?;
                (records, None)
            }
            Some(cursor) if cursor.last_time < stale_before => {
                let poll_interval =
                    TimeDelta::from_std(self.settings.poll_interval).unwrap_or_else(|_| TimeDelta::zero());
                let resume = datetime_to_epoch(now - poll_interval);
                let gap = Gap {
                    from: cursor.last_time,
                    to: resume,
                };
                tracing::warn!(
                    from = gap.from,
                    to = gap.to,
                    "cursor older than retention window, skipping to recent heartbeats"
                );
                (self.source.heartbeats_after(resume)?, Some(gap))
            }
            Some(cursor) => (self.source.heartbeats_after(cursor.last_time)?, None),
        };

        let mut report = IngestReport {
            count: records.len(),
            cursor: cursor.map(|cursor| cursor.last_time),
            gap,
            ..IngestReport::default()
        };

        for heartbeat in &records {
            match self.db.upsert_heartbeat(heartbeat, now) {
                Ok(()) => report.stored += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        id = heartbeat.id,
                        user_id = %heartbeat.user_id,
                        time = heartbeat.time,
                        created_at = %heartbeat.created_at,
                        payload = ?heartbeat,
                        error = %err,
                        "failed to store heartbeat"
                    );
                }
            }
        }

        let target = if report.stored > 0 {
            newest_valid_time(&records)
        } else {
            None
        };
        // A re-bootstrap moves past the gap even when nothing new arrived.
        let target = match (target, gap) {
            (Some(time), Some(gap)) => Some(time.max(gap.to)),
            (None, Some(gap)) => Some(gap.to),
            (target, None) => target,
        };
        if let Some(time) = target {
            let stored = self
                .db
                .advance_cursor(time, now)
                .context("failed to advance cursor")?;
            report.cursor = Some(stored);
        }

        self.purge(now, &mut report);
        report.records = records;

        tracing::debug!(
            count = report.count,
            stored = report.stored,
            failed = report.failed,
            cursor = ?report.cursor,
            "ingest cycle complete"
        );
        Ok(report)
    }

    fn purge(&self, now: DateTime<Utc>, report: &mut IngestReport) {
        match self
            .db
            .purge_heartbeats_before(now - self.settings.retention)
        {
            Ok(removed) => report.purged_heartbeats = removed,
            Err(err) => tracing::warn!(error = %err, "failed to purge synced heartbeats"),
        }
        match self
            .db
            .purge_snapshots_before(now - self.settings.snapshot_retention)
        {
            Ok(removed) => report.purged_snapshots = removed,
            Err(err) => tracing::warn!(error = %err, "failed to purge summary snapshots"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fakes::{FakeSource, heartbeat, now};

    use hb_core::timestamp::format_timestamp;

    fn setup(source: FakeSource) -> (Arc<Database>, Arc<FakeSource>, Ingester) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let source = Arc::new(source);
        let ingester = Ingester::new(db.clone(), source.clone(), PipelineSettings::default());
        (db, source, ingester)
    }

    fn epoch(offset_secs: i64) -> f64 {
        datetime_to_epoch(now() + TimeDelta::seconds(offset_secs))
    }

    #[test]
    fn first_run_bootstraps_from_recent_heartbeats() {
        let (db, source, ingester) = setup(FakeSource::with(vec![
            heartbeat(1, "U1", "site", epoch(-300)),
            heartbeat(2, "U2", "api", epoch(-200)),
        ]));

        let report = ingester.ingest(now()).unwrap();

        assert_eq!(report.count, 2);
        assert_eq!(report.stored, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.cursor, Some(epoch(-200)));
        assert!(report.gap.is_none());
        assert_eq!(source.queries.lock().unwrap()[0], "recent 1000");
        assert_eq!(db.table_counts().unwrap().synced_heartbeats, 2);
    }

    #[test]
    fn later_runs_select_strictly_after_cursor() {
        let (_db, source, ingester) =
            setup(FakeSource::with(vec![heartbeat(1, "U1", "site", epoch(-300))]));
        ingester.ingest(now()).unwrap();

        let report = ingester.ingest(now()).unwrap();
        assert_eq!(report.count, 0);
        assert_eq!(report.cursor, Some(epoch(-300)));

        source.push(heartbeat(2, "U1", "site", epoch(-100)));
        let report = ingester.ingest(now()).unwrap();
        assert_eq!(
            report.records.iter().map(|hb| hb.id).collect::<Vec<_>>(),
            vec![2]
        );
        assert_eq!(report.cursor, Some(epoch(-100)));
    }

    #[test]
    fn invalid_record_is_isolated_and_never_moves_cursor() {
        let (db, _source, ingester) = setup(FakeSource::with(vec![
            heartbeat(1, "U1", "site", epoch(-300)),
            heartbeat(2, "U1", "site", 4.0e12),
        ]));

        let report = ingester.ingest(now()).unwrap();

        assert_eq!(report.count, 2);
        assert_eq!(report.stored, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cursor, Some(epoch(-300)));
        assert!(db.synced_heartbeat(2).unwrap().is_none());
        assert_eq!(report.records.len(), 2);
    }

    #[test]
    fn nothing_stored_leaves_cursor_untouched() {
        let (db, _source, ingester) =
            setup(FakeSource::with(vec![heartbeat(1, "U1", "site", f64::NAN)]));

        let report = ingester.ingest(now()).unwrap();

        assert_eq!(report.failed, 1);
        assert!(report.cursor.is_none());
        assert!(db.cursor().unwrap().is_none());
    }

    #[test]
    fn upstream_failure_aborts_without_advancing() {
        let (db, source, ingester) =
            setup(FakeSource::with(vec![heartbeat(1, "U1", "site", epoch(-300))]));
        ingester.ingest(now()).unwrap();

        source.push(heartbeat(2, "U1", "site", epoch(-100)));
        *source.unavailable.lock().unwrap() = true;
        assert!(ingester.ingest(now()).is_err());

        let cursor = db.cursor().unwrap().unwrap();
        assert!((cursor.last_time - epoch(-300)).abs() < f64::EPSILON);
    }

    #[test]
    fn stale_cursor_rebootstraps_and_reports_gap() {
        let (db, source, ingester) = setup(FakeSource::with(vec![
            heartbeat(1, "U1", "site", epoch(-3)),
            heartbeat(2, "U1", "site", epoch(-600)),
        ]));
        db.advance_cursor(epoch(-2 * 86_400), now()).unwrap();

        let report = ingester.ingest(now()).unwrap();

        let gap = report.gap.unwrap();
        assert!((gap.from - epoch(-2 * 86_400)).abs() < f64::EPSILON);
        assert!((gap.to - epoch(-5)).abs() < f64::EPSILON);
        assert_eq!(
            report.records.iter().map(|hb| hb.id).collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(report.cursor, Some(epoch(-3)));
        assert_eq!(
            source.queries.lock().unwrap().last().unwrap(),
            &format!("after {}", epoch(-5))
        );
    }

    #[test]
    fn stale_cursor_with_no_new_records_moves_past_gap() {
        let (db, _source, ingester) = setup(FakeSource::default());
        db.advance_cursor(epoch(-2 * 86_400), now()).unwrap();

        let report = ingester.ingest(now()).unwrap();
        assert!(report.gap.is_some());
        assert_eq!(report.cursor, Some(epoch(-5)));

        let report = ingester.ingest(now()).unwrap();
        assert!(report.gap.is_none());
    }

    #[test]
    fn purges_expired_heartbeats_and_snapshots() {
        let (db, _source, ingester) = setup(FakeSource::default());
        let mut old = heartbeat(1, "U1", "site", epoch(-90_000));
        old.created_at = format_timestamp(now() - TimeDelta::hours(25));
        db.upsert_heartbeat(&old, now()).unwrap();
        db.upsert_heartbeat(&heartbeat(2, "U1", "site", epoch(-60)), now())
            .unwrap();
        db.insert_snapshot("U1", &hb_core::Summary::default(), now() - TimeDelta::days(9))
            .unwrap();
        db.insert_snapshot("U1", &hb_core::Summary::default(), now())
            .unwrap();

        let report = ingester.ingest(now()).unwrap();

        assert_eq!(report.purged_heartbeats, 1);
        assert_eq!(report.purged_snapshots, 1);
        assert!(db.synced_heartbeat(1).unwrap().is_none());
        assert!(db.synced_heartbeat(2).unwrap().is_some());
    }
}
