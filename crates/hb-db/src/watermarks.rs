//! Per-(user, project) notification watermarks.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use hb_core::Watermark;
use hb_core::timestamp::format_timestamp;

use crate::{Database, DbError, parse_stored_timestamp};

impl Database {
    /// Returns the watermark for a (user, project) pair.
    pub fn watermark(&self, user_id: &str, project: &str) -> Result<Option<Watermark>, DbError> {
        let conn = self.conn()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT last_notified_at, last_total_seconds FROM project_notifications
                 WHERE user_id = ?1 AND project = ?2",
                params![user_id, project],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        drop(conn);

        row.map(|(notified_at, last_total_seconds)| {
            Ok(Watermark {
                user_id: user_id.to_string(),
                project: project.to_string(),
                last_notified_at: parse_stored_timestamp("project_notifications", &notified_at)?,
                last_total_seconds,
            })
        })
        .transpose()
    }

    /// Records the first-seen baseline for a pair.
    ///
    /// Returns `false` if a watermark already existed; the existing row is
    /// left untouched.
    pub fn insert_watermark(&self, watermark: &Watermark) -> Result<bool, DbError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO project_notifications (user_id, project, last_notified_at, last_total_seconds)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, project) DO NOTHING",
            params![
                watermark.user_id,
                watermark.project,
                format_timestamp(watermark.last_notified_at),
                watermark.last_total_seconds,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Moves a pair's baseline forward after a notification.
    ///
    /// The baseline never decreases: an update to a value at or below the
    /// stored one is ignored. Returns whether the row changed.
    pub fn advance_watermark(
        &self,
        user_id: &str,
        project: &str,
        total_seconds: i64,
        notified_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE project_notifications
             SET last_total_seconds = ?3, last_notified_at = ?4
             WHERE user_id = ?1 AND project = ?2 AND last_total_seconds < ?3",
            params![user_id, project, total_seconds, format_timestamp(notified_at)],
        )?;
        Ok(updated > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap()
    }

    fn watermark(total: i64) -> Watermark {
        Watermark {
            user_id: "U1".to_string(),
            project: "site".to_string(),
            last_notified_at: at(9),
            last_total_seconds: total,
        }
    }

    #[test]
    fn missing_watermark_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.watermark("U1", "site").unwrap().is_none());
    }

    #[test]
    fn insert_keeps_first_baseline() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_watermark(&watermark(3000)).unwrap());
        assert!(!db.insert_watermark(&watermark(9000)).unwrap());

        let stored = db.watermark("U1", "site").unwrap().unwrap();
        assert_eq!(stored, watermark(3000));
    }

    #[test]
    fn advance_moves_baseline_forward() {
        let db = Database::open_in_memory().unwrap();
        db.insert_watermark(&watermark(3000)).unwrap();

        assert!(db.advance_watermark("U1", "site", 6600, at(10)).unwrap());

        let stored = db.watermark("U1", "site").unwrap().unwrap();
        assert_eq!(stored.last_total_seconds, 6600);
        assert_eq!(stored.last_notified_at, at(10));
    }

    #[test]
    fn advance_never_decreases_baseline() {
        let db = Database::open_in_memory().unwrap();
        db.insert_watermark(&watermark(6600)).unwrap();

        assert!(!db.advance_watermark("U1", "site", 3000, at(10)).unwrap());
        assert!(!db.advance_watermark("U1", "site", 6600, at(11)).unwrap());

        let stored = db.watermark("U1", "site").unwrap().unwrap();
        assert_eq!(stored, watermark(6600));
    }

    #[test]
    fn watermarks_are_per_project() {
        let db = Database::open_in_memory().unwrap();
        db.insert_watermark(&watermark(100)).unwrap();
        db.insert_watermark(&Watermark {
            project: "api".to_string(),
            ..watermark(200)
        })
        .unwrap();

        assert_eq!(db.table_counts().unwrap().project_notifications, 2);
        assert_eq!(
            db.watermark("U1", "api").unwrap().unwrap().last_total_seconds,
            200
        );
    }
}
