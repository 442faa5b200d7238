//! Single poll tick.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;

use hb_db::Database;

use super::Pipeline;
use crate::Config;
use crate::pipeline::TickReport;

pub fn run<W: Write>(writer: &mut W, config: &Config, db: Database, json: bool) -> Result<()> {
    let pipeline = Pipeline::connect(config, db)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let report = runtime
        .block_on(pipeline.poller.tick(Utc::now()))
        .context("poll tick failed")?;
    pipeline.close()?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_report(writer, &report)?;
    }
    Ok(())
}

fn write_report<W: Write>(writer: &mut W, report: &TickReport) -> Result<()> {
    let ingest = &report.ingest;
    writeln!(
        writer,
        "Heartbeats: {} selected, {} stored, {} failed",
        ingest.count, ingest.stored, ingest.failed
    )?;
    match ingest.cursor {
        Some(cursor) => writeln!(writer, "Cursor: {cursor}")?,
        None => writeln!(writer, "Cursor: not set")?,
    }
    if let Some(gap) = ingest.gap {
        writeln!(writer, "Skipped stale range: {} .. {}", gap.from, gap.to)?;
    }
    writeln!(
        writer,
        "Purged: {} heartbeats, {} snapshots",
        ingest.purged_heartbeats, ingest.purged_snapshots
    )?;

    let summarize = &report.summarize;
    writeln!(
        writer,
        "Users: {} active, {} snapshots, {} without key, {} failed",
        summarize.users, summarize.snapshots, summarize.skipped, summarize.failed
    )?;

    let detect = &summarize.detect;
    writeln!(
        writer,
        "Milestones: {} ({} messages sent, {} failed)",
        detect.milestones.len(),
        detect.sent,
        detect.failed_sends
    )?;
    for milestone in &detect.milestones {
        writeln!(writer, "- {}", milestone.message())?;
    }
    Ok(())
}
