//! Summary snapshot persistence.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use hb_core::timestamp::format_timestamp;
use hb_core::{Summary, SummaryItem, SummarySnapshot};

use crate::{Database, DbError, parse_stored_timestamp};

impl Database {
    /// Appends a snapshot of `summary` for `user_id`.
    pub fn insert_snapshot(
        &self,
        user_id: &str,
        summary: &Summary,
        created_at: DateTime<Utc>,
    ) -> Result<SummarySnapshot, DbError> {
        let id = Uuid::new_v4().to_string();
        let encode = |items: &[SummaryItem]| {
            serde_json::to_string(items).map_err(|source| DbError::SnapshotPayload {
                id: id.clone(),
                source,
            })
        };
        let projects = encode(&summary.projects)?;
        let languages = encode(&summary.languages)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_summaries (id, user_id, projects, languages, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user_id, projects, languages, format_timestamp(created_at)],
        )?;
        drop(conn);

        Ok(SummarySnapshot {
            id,
            user_id: user_id.to_string(),
            created_at,
            summary: summary.clone(),
        })
    }

    /// Returns a user's snapshots taken within `[start, end]`, oldest first.
    pub fn snapshots_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SummarySnapshot>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, projects, languages, created_at FROM user_summaries
             WHERE user_id = ?1 AND created_at >= ?2 AND created_at <= ?3
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(
                params![user_id, format_timestamp(start), format_timestamp(end)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter()
            .map(|(id, projects, languages, created_at)| {
                let created_at = parse_stored_timestamp("user_summaries", &created_at)?;
                let decode = |payload: &str| {
                    serde_json::from_str::<Vec<SummaryItem>>(payload).map_err(|source| {
                        DbError::SnapshotPayload {
                            id: id.clone(),
                            source,
                        }
                    })
                };
                let summary = Summary {
                    projects: decode(&projects)?,
                    languages: decode(&languages)?,
                };
                Ok(SummarySnapshot {
                    id,
                    user_id: user_id.to_string(),
                    created_at,
                    summary,
                })
            })
            .collect()
    }

    /// Deletes snapshots taken before `cutoff`.
    ///
    /// Returns the number of rows removed.
    pub fn purge_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM user_summaries WHERE created_at < ?1",
            params![format_timestamp(cutoff)],
        )?;
        Ok(removed)
    }
}
