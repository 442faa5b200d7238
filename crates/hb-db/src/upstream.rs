//! Read-only access to the upstream activity store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags, OptionalExtension, Params, params};

use hb_core::{CapabilityError, CredentialDirectory, Heartbeat, HeartbeatSource};

use crate::heartbeats::{HEARTBEAT_COLUMNS, heartbeat_from_row};
use crate::{BUSY_TIMEOUT, DbError};

/// Tables this reader expects in the upstream store.
///
/// The upstream owns its schema; this is the subset queried here, and is used
/// to build fixture stores.
pub const UPSTREAM_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS heartbeats (
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
        dependencies TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_heartbeats_time ON heartbeats(time);

    CREATE TABLE IF NOT EXISTS api_keys (
        user_id TEXT NOT NULL,
        token TEXT NOT NULL
    );
";

/// Reader over the upstream store's heartbeats and API keys.
///
/// The connection is opened read-only; nothing here can write upstream.
pub struct UpstreamStore {
    conn: Mutex<Connection>,
}

impl UpstreamStore {
    /// Opens the upstream store read-only.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        tracing::debug!(path = %path.display(), "opened upstream store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    pub fn close(self) -> Result<(), DbError> {
        let conn = self.conn.into_inner().map_err(|_| DbError::Poisoned)?;
        conn.close().map_err(|(_, err)| DbError::Sqlite(err))
    }

    /// Heartbeats with event time strictly after `after`, newest first.
    pub fn heartbeats_after(&self, after: f64) -> Result<Vec<Heartbeat>, DbError> {
        self.query_heartbeats(
            &format!(
                "SELECT {HEARTBEAT_COLUMNS} FROM heartbeats
                 WHERE time > ?1 ORDER BY time DESC, id DESC"
            ),
            params![after],
        )
    }

    /// The `limit` most recent heartbeats, newest first.
    pub fn recent_heartbeats(&self, limit: usize) -> Result<Vec<Heartbeat>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_heartbeats(
            &format!(
                "SELECT {HEARTBEAT_COLUMNS} FROM heartbeats
                 ORDER BY time DESC, id DESC LIMIT ?1"
            ),
            params![limit],
        )
    }

    /// Returns the user's newest API key, if any.
    pub fn api_key(&self, user_id: &str) -> Result<Option<String>, DbError> {
        let conn = self.conn()?;
        let token = conn
            .query_row(
                "SELECT token FROM api_keys WHERE user_id = ?1 ORDER BY rowid DESC LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token)
    }

    /// Runs a heartbeat query, skipping rows whose columns cannot be decoded.
    fn query_heartbeats<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Heartbeat>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;

        let mut heartbeats = Vec::new();
        let mut skipped = 0_usize;
        while let Some(row) = rows.next()? {
            match heartbeat_from_row(row) {
                Ok(heartbeat) => heartbeats.push(heartbeat),
                Err(err) => {
                    skipped += 1;
                    let id: Option<i64> = row.get(0).ok();
                    tracing::warn!(?id, error = %err, "skipping malformed upstream heartbeat");
                }
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "upstream query returned malformed rows");
        }
        Ok(heartbeats)
    }
}

impl HeartbeatSource for UpstreamStore {
    fn heartbeats_after(&self, after: f64) -> Result<Vec<Heartbeat>, CapabilityError> {
        Self::heartbeats_after(self, after)
            .map_err(|err| CapabilityError::new("upstream heartbeat query", err))
    }

    fn recent_heartbeats(&self, limit: usize) -> Result<Vec<Heartbeat>, CapabilityError> {
        Self::recent_heartbeats(self, limit)
            .map_err(|err| CapabilityError::new("upstream heartbeat query", err))
    }
}

impl CredentialDirectory for UpstreamStore {
    fn api_key(&self, user_id: &str) -> Result<Option<String>, CapabilityError> {
        Self::api_key(self, user_id).map_err(|err| CapabilityError::new("api key lookup", err))
    }
}
