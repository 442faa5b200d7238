//! Local heartbeat copies.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use hb_core::Heartbeat;
use hb_core::timestamp::format_timestamp;

use crate::{Database, DbError};

/// Heartbeat columns shared by the local table and the upstream store, in
/// the order [`heartbeat_from_row`] reads them.
pub(crate) const HEARTBEAT_COLUMNS: &str = "id, user_id, entity, type, category, project, \
     branch, language, is_write, editor, operating_system, machine, user_agent, time, hash, \
     origin, origin_id, created_at, project_root_count, line_additions, line_deletions, lines, \
     line_number, cursor_position, dependencies";

pub(crate) fn heartbeat_from_row(row: &Row<'_>) -> rusqlite::Result<Heartbeat> {
    Ok(Heartbeat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        entity: row.get(2)?,
        kind: row.get(3)?,
        category: row.get(4)?,
        project: row.get(5)?,
        branch: row.get(6)?,
        language: row.get(7)?,
        is_write: row.get(8)?,
        editor: row.get(9)?,
        operating_system: row.get(10)?,
        machine: row.get(11)?,
        user_agent: row.get(12)?,
        time: row.get(13)?,
        hash: row.get(14)?,
        origin: row.get(15)?,
        origin_id: row.get(16)?,
        created_at: row.get(17)?,
        project_root_count: row.get(18)?,
        line_additions: row.get(19)?,
        line_deletions: row.get(20)?,
        lines: row.get(21)?,
        line_number: row.get(22)?,
        cursor_position: row.get(23)?,
        dependencies: row.get(24)?,
    })
}

impl Database {
    /// Stores a heartbeat, replacing any existing record with the same id.
    ///
    /// The record is validated first. `created_at` is normalized to the
    /// millisecond RFC 3339 form so retention purges compare correctly.
    pub fn upsert_heartbeat(
        &self,
        heartbeat: &Heartbeat,
        synced_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        heartbeat.validate()?;
        let created_at = format_timestamp(heartbeat.ingested_at()?);

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO synced_heartbeats ({HEARTBEAT_COLUMNS}, synced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                         ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)
                 ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    entity = excluded.entity,
                    type = excluded.type,
                    category = excluded.category,
                    project = excluded.project,
                    branch = excluded.branch,
                    language = excluded.language,
                    is_write = excluded.is_write,
                    editor = excluded.editor,
                    operating_system = excluded.operating_system,
                    machine = excluded.machine,
                    user_agent = excluded.user_agent,
                    time = excluded.time,
                    hash = excluded.hash,
                    origin = excluded.origin,
                    origin_id = excluded.origin_id,
                    created_at = excluded.created_at,
                    project_root_count = excluded.project_root_count,
                    line_additions = excluded.line_additions,
                    line_deletions = excluded.line_deletions,
                    lines = excluded.lines,
                    line_number = excluded.line_number,
                    cursor_position = excluded.cursor_position,
                    dependencies = excluded.dependencies,
                    synced_at = excluded.synced_at"
            ),
            params![
                heartbeat.id,
                heartbeat.user_id,
                heartbeat.entity,
                heartbeat.kind,
                heartbeat.category,
                heartbeat.project,
                heartbeat.branch,
                heartbeat.language,
                heartbeat.is_write,
                heartbeat.editor,
                heartbeat.operating_system,
                heartbeat.machine,
                heartbeat.user_agent,
                heartbeat.time,
                heartbeat.hash,
                heartbeat.origin,
                heartbeat.origin_id,
                created_at,
                heartbeat.project_root_count,
                heartbeat.line_additions,
                heartbeat.line_deletions,
                heartbeat.lines,
                heartbeat.line_number,
                heartbeat.cursor_position,
                heartbeat.dependencies,
                format_timestamp(synced_at),
            ],
        )?;
        Ok(())
    }

    /// Returns a stored heartbeat by upstream id.
    pub fn synced_heartbeat(&self, id: i64) -> Result<Option<Heartbeat>, DbError> {
        let conn = self.conn()?;
        let heartbeat = conn
            .query_row(
                &format!("SELECT {HEARTBEAT_COLUMNS} FROM synced_heartbeats WHERE id = ?1"),
                params![id],
                heartbeat_from_row,
            )
            .optional()?;
        Ok(heartbeat)
    }

    /// Deletes heartbeats ingested upstream before `cutoff`.
    ///
    /// Returns the number of rows removed.
    pub fn purge_heartbeats_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM synced_heartbeats WHERE created_at < ?1",
            params![format_timestamp(cutoff)],
        )?;
        Ok(removed)
    }
}
