//! Storage layer for heartbeat milestones.
//!
//! Provides persistence for the change-feed cursor, synced heartbeats,
//! summary snapshots, notification watermarks, and notification preferences
//! using `rusqlite`, plus a read-only reader over the upstream activity store.
//!
//! # Thread Safety
//!
//! [`Database`] wraps its `rusqlite::Connection` in a `Mutex`, so a single
//! handle can be shared across tasks behind an `Arc`. Every operation holds
//! the lock for exactly one statement or one transaction; the guard is
//! released on every exit path, including errors.
//!
//! File databases run in WAL mode with a busy timeout so a reader in another
//! process (for example a leaderboard request) neither blocks nor is blocked
//! by the polling loop.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering. Heartbeat event times and the cursor are stored as
//! REAL epoch seconds, exactly as the upstream reports them.
//!
//! ## Snapshot Payload Storage
//!
//! The `projects` and `languages` columns of `user_summaries` store the JSON
//! arrays returned by the summary API. Rows are append-only.

mod cursor;
mod heartbeats;
mod preferences;
mod snapshots;
mod upstream;
mod watermarks;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

use hb_core::HeartbeatError;

pub use cursor::Cursor;
pub use preferences::NotificationPreference;
pub use upstream::{UPSTREAM_SCHEMA, UpstreamStore};

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A previous holder of the connection lock panicked.
    #[error("database connection lock poisoned")]
    Poisoned,
    /// A heartbeat failed validation before being stored.
    #[error(transparent)]
    InvalidHeartbeat(#[from] HeartbeatError),
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp in {table}: {value}")]
    TimestampParse { table: &'static str, value: String },
    /// A snapshot payload could not be encoded or decoded.
    #[error("invalid snapshot payload {id}: {source}")]
    SnapshotPayload {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Mutex<Connection>,
}

/// Row counts per table, for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub synced_heartbeats: i64,
    pub user_summaries: i64,
    pub project_notifications: i64,
    pub notification_preferences: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened database");
        Self::init(conn)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(
            "
            -- Singleton change-feed cursor: event time of the newest ingested heartbeat
            CREATE TABLE IF NOT EXISTS sync_cursor (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_time REAL NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Local copy of upstream heartbeats, purged past the retention window
            CREATE TABLE IF NOT EXISTS synced_heartbeats (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                entity TEXT NOT NULL,
                type TEXT,
                category TEXT,
                project TEXT,
                branch TEXT,
                language TEXT,
                is_write INTEGER,
                editor TEXT,
                operating_system TEXT,
                machine TEXT,
                user_agent TEXT,
                time REAL NOT NULL,
                hash TEXT,
                origin TEXT,
                origin_id TEXT,
                created_at TEXT NOT NULL,
                project_root_count INTEGER,
                line_additions INTEGER,
                line_deletions INTEGER,
                lines INTEGER,
                line_number INTEGER,
                cursor_position INTEGER,
                dependencies TEXT,
                synced_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_synced_heartbeats_created ON synced_heartbeats(created_at);
            CREATE INDEX IF NOT EXISTS idx_synced_heartbeats_user ON synced_heartbeats(user_id);

            -- Append-only summary snapshots
            -- projects/languages: JSON arrays of {key, total}
            CREATE TABLE IF NOT EXISTS user_summaries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                projects TEXT NOT NULL,
                languages TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_user_summaries_user_created ON user_summaries(user_id, created_at);

            CREATE TABLE IF NOT EXISTS project_notifications (
                user_id TEXT NOT NULL,
                project TEXT NOT NULL,
                last_notified_at TEXT NOT NULL,
                last_total_seconds INTEGER NOT NULL,
                PRIMARY KEY (user_id, project)
            );

            CREATE TABLE IF NOT EXISTS notification_preferences (
                user_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, channel_id)
            );

            CREATE INDEX IF NOT EXISTS idx_notification_preferences_channel
                ON notification_preferences(channel_id, enabled);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquires the connection for one operation.
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Returns row counts for every owned table.
    pub fn table_counts(&self) -> Result<TableCounts, DbError> {
        let conn = self.conn()?;
        let count = |table: &str| -> Result<i64, DbError> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?)
        };
        Ok(TableCounts {
            synced_heartbeats: count("synced_heartbeats")?,
            user_summaries: count("user_summaries")?,
            project_notifications: count("project_notifications")?,
            notification_preferences: count("notification_preferences")?,
        })
    }

    /// Closes the connection, surfacing any error from finalizing it.
    pub fn close(self) -> Result<(), DbError> {
        let conn = self.conn.into_inner().map_err(|_| DbError::Poisoned)?;
        conn.close().map_err(|(_, err)| DbError::Sqlite(err))
    }
}

fn parse_stored_timestamp(
    table: &'static str,
    value: &str,
) -> Result<chrono::DateTime<chrono::Utc>, DbError> {
    hb_core::timestamp::parse_timestamp(value).ok_or_else(|| DbError::TimestampParse {
        table,
        value: value.to_string(),
    })
}
