//! Integration tests for the full polling pipeline.
//!
//! Uses a real upstream SQLite file and a real local database, with fakes
//! standing in for the summary API and the chat platform.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rusqlite::{Connection, params};
use tempfile::TempDir;

use hb_cli::pipeline::{Ingester, MilestoneDetector, PipelineSettings, Poller, Summarizer};
use hb_core::timestamp::{datetime_to_epoch, format_timestamp};
use hb_core::{
    CapabilityError, Notifier, Summary, SummaryFetcher, SummaryItem, Watermark, async_trait,
};
use hb_db::{Database, UPSTREAM_SCHEMA, UpstreamStore};

#[derive(Default)]
struct StaticSummaries {
    by_key: Mutex<HashMap<String, Summary>>,
}

impl StaticSummaries {
    fn set(&self, api_key: &str, projects: &[(&str, i64)]) {
        let summary = Summary {
            projects: projects
                .iter()
                .map(|(key, total)| SummaryItem::new(*key, *total))
                .collect(),
            languages: vec![SummaryItem::new(
                "Rust",
                projects.iter().map(|(_, total)| total).sum(),
            )],
        };
        self.by_key
            .lock()
            .unwrap()
            .insert(api_key.to_string(), summary);
    }
}

#[async_trait]
impl SummaryFetcher for StaticSummaries {
    async fn fetch_summary(&self, api_key: &str) -> Result<Summary, CapabilityError> {
        self.by_key
            .lock()
            .unwrap()
            .get(api_key)
            .cloned()
            .ok_or_else(|| CapabilityError::new("summary fetch", "unknown api key"))
    }
}

#[derive(Default)]
struct Outbox {
    messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for Outbox {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), CapabilityError> {
        self.messages
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

struct Harness {
    _temp: TempDir,
    upstream: Connection,
    db: Arc<Database>,
    summaries: Arc<StaticSummaries>,
    outbox: Arc<Outbox>,
    poller: Poller,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

fn harness() -> Harness {
    let temp = TempDir::new().unwrap();
    let upstream_path = temp.path().join("upstream.db");
    let upstream = Connection::open(&upstream_path).unwrap();
    upstream.execute_batch(UPSTREAM_SCHEMA).unwrap();

    let store = Arc::new(UpstreamStore::open(&upstream_path).unwrap());
    let db = Arc::new(Database::open(&temp.path().join("hb.db")).unwrap());
    let summaries = Arc::new(StaticSummaries::default());
    let outbox = Arc::new(Outbox::default());
    let settings = PipelineSettings::default();

    let ingester = Ingester::new(db.clone(), store.clone(), settings);
    let detector = MilestoneDetector::new(db.clone(), outbox.clone(), settings.notification_period);
    let summarizer = Summarizer::new(db.clone(), store, summaries.clone(), detector);

    Harness {
        _temp: temp,
        upstream,
        db,
        summaries,
        outbox,
        poller: Poller::new(ingester, summarizer, settings.poll_interval),
    }
}

fn record_heartbeat(conn: &Connection, id: i64, user_id: &str, at: DateTime<Utc>) {
    conn.execute(
        "INSERT INTO heartbeats (id, user_id, entity, type, category, project, language, time, created_at)
         VALUES (?1, ?2, '/src/main.rs', 'file', 'coding', 'site', 'Rust', ?3, ?4)",
        params![id, user_id, datetime_to_epoch(at), format_timestamp(at)],
    )
    .unwrap();
}

fn register_key(conn: &Connection, user_id: &str, token: &str) {
    conn.execute(
        "INSERT INTO api_keys (user_id, token) VALUES (?1, ?2)",
        params![user_id, token],
    )
    .unwrap();
}

fn watermark_total(db: &Database, user_id: &str, project: &str) -> Option<i64> {
    db.watermark(user_id, project)
        .unwrap()
        .map(|watermark| watermark.last_total_seconds)
}

#[tokio::test]
async fn milestone_fires_once_per_elapsed_period() {
    let h = harness();
    register_key(&h.upstream, "U1", "key-1");
    h.db.set_preference("U1", "C1", true, now()).unwrap();
    h.db.insert_watermark(&Watermark {
        user_id: "U1".to_string(),
        project: "site".to_string(),
        last_notified_at: now() - TimeDelta::hours(2),
        last_total_seconds: 0,
    })
    .unwrap();
    h.summaries.set("key-1", &[("site", 3650)]);

    record_heartbeat(&h.upstream, 1, "U1", now() - TimeDelta::minutes(1));
    let report = h.poller.tick(now()).await.unwrap();

    assert_eq!(report.ingest.stored, 1);
    assert_eq!(report.summarize.snapshots, 1);
    assert_eq!(report.summarize.detect.milestones.len(), 1);
    assert_eq!(report.summarize.detect.milestones[0].elapsed_seconds, 3600);
    assert_eq!(watermark_total(&h.db, "U1", "site"), Some(3600));
    assert_eq!(
        h.outbox.messages.lock().unwrap().clone(),
        vec![(
            "C1".to_string(),
            ":tada: <@U1> just coded another 1h 0m on *site*! That's 1h 0m in total.".to_string()
        )]
    );

    // Same total on the next batch: nothing new to celebrate.
    record_heartbeat(&h.upstream, 2, "U1", now() - TimeDelta::seconds(30));
    let report = h.poller.tick(now()).await.unwrap();

    assert_eq!(report.ingest.count, 1);
    assert!(report.summarize.detect.milestones.is_empty());
    assert_eq!(watermark_total(&h.db, "U1", "site"), Some(3600));
    assert_eq!(h.outbox.messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn first_sight_is_silent_and_later_growth_notifies() {
    let h = harness();
    register_key(&h.upstream, "U1", "key-1");
    h.db.set_preference("U1", "C1", true, now()).unwrap();
    h.summaries.set("key-1", &[("site", 50_000)]);

    record_heartbeat(&h.upstream, 1, "U1", now() - TimeDelta::minutes(5));
    h.poller.tick(now()).await.unwrap();

    assert_eq!(watermark_total(&h.db, "U1", "site"), Some(50_000));
    assert!(h.outbox.messages.lock().unwrap().is_empty());

    h.summaries.set("key-1", &[("site", 50_000 + 7300)]);
    record_heartbeat(&h.upstream, 2, "U1", now() - TimeDelta::minutes(1));
    let report = h.poller.tick(now()).await.unwrap();

    assert_eq!(report.summarize.detect.milestones[0].periods, 2);
    assert_eq!(watermark_total(&h.db, "U1", "site"), Some(57_200));
    assert_eq!(h.outbox.messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn ticks_without_new_heartbeats_do_nothing() {
    let h = harness();
    register_key(&h.upstream, "U1", "key-1");
    h.summaries.set("key-1", &[("site", 100)]);

    record_heartbeat(&h.upstream, 1, "U1", now() - TimeDelta::minutes(1));
    let first = h.poller.tick(now()).await.unwrap();
    let second = h.poller.tick(now()).await.unwrap();

    assert_eq!(first.summarize.users, 1);
    assert_eq!(second.ingest.count, 0);
    assert_eq!(second.summarize.users, 0);
    assert_eq!(h.db.table_counts().unwrap().user_summaries, 1);
}

#[tokio::test]
async fn users_without_keys_are_mirrored_but_not_summarized() {
    let h = harness();
    record_heartbeat(&h.upstream, 1, "U9", now() - TimeDelta::minutes(1));

    let report = h.poller.tick(now()).await.unwrap();

    assert_eq!(report.ingest.stored, 1);
    assert_eq!(report.summarize.skipped, 1);
    assert!(h.db.synced_heartbeat(1).unwrap().is_some());
    assert_eq!(h.db.table_counts().unwrap().user_summaries, 0);
}

#[test]
fn status_command_runs_against_fresh_database() {
    let temp = TempDir::new().unwrap();
    let output = hb_command(temp.path())
        .arg("status")
        .output()
        .expect("failed to run hb status");

    assert!(
        output.status.success(),
        "hb status should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cursor: not set"));
    assert!(stdout.contains("Notification preferences: 0"));
}

#[test]
fn command_subcommand_toggles_preference() {
    let temp = TempDir::new().unwrap();
    let run = |text: &[&str]| {
        let output = hb_command(temp.path())
            .args(["command", "--user", "U1", "--channel", "C1"])
            .args(text)
            .output()
            .expect("failed to run hb command");
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };

    assert_eq!(run(&["on"]), "Milestone notifications enabled in this channel.");
    assert_eq!(
        run(&["status"]),
        "Milestone notifications are enabled in this channel."
    );
    assert_eq!(
        run(&["leaderboard", "week"]),
        "No coding activity recorded for the past week yet."
    );
}

fn hb_command(home: &Path) -> std::process::Command {
    let mut command = std::process::Command::new(env!("CARGO_BIN_EXE_hb"));
    command
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("HB_DATABASE_PATH", home.join("hb.db"));
    command
}
