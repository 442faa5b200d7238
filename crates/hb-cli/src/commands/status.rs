//! Status command for showing cursor position and table sizes.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use hb_core::timestamp::{epoch_to_datetime, format_timestamp};
use hb_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let cursor = db.cursor().context("failed to read cursor")?;
    let counts = db.table_counts().context("failed to count rows")?;

    writeln!(writer, "Heartbeat milestones status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    match cursor {
        Some(cursor) => {
            let at = epoch_to_datetime(cursor.last_time)
                .map_or_else(|| "invalid".to_string(), format_timestamp);
            writeln!(
                writer,
                "Cursor: {} ({at}), updated {}",
                cursor.last_time,
                format_timestamp(cursor.updated_at)
            )?;
        }
        None => writeln!(writer, "Cursor: not set (next poll bootstraps)")?,
    }
    writeln!(writer, "Synced heartbeats: {}", counts.synced_heartbeats)?;
    writeln!(writer, "Summary snapshots: {}", counts.user_summaries)?;
    writeln!(writer, "Project watermarks: {}", counts.project_notifications)?;
    writeln!(
        writer,
        "Notification preferences: {}",
        counts.notification_preferences
    )?;
    Ok(())
}
