//! Change-feed cursor persistence.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use hb_core::timestamp::format_timestamp;

use crate::{Database, DbError, parse_stored_timestamp};

/// Position of the ingester in the upstream change feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    /// Event time (epoch seconds) of the newest ingested heartbeat.
    pub last_time: f64,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Returns the stored cursor, or `None` before the first ingest.
    pub fn cursor(&self) -> Result<Option<Cursor>, DbError> {
        let conn = self.conn()?;
        let row: Option<(f64, String)> = conn
            .query_row(
                "SELECT last_time, updated_at FROM sync_cursor WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        drop(conn);

        row.map(|(last_time, updated_at)| {
            Ok(Cursor {
                last_time,
                updated_at: parse_stored_timestamp("sync_cursor", &updated_at)?,
            })
        })
        .transpose()
    }

    /// Moves the cursor forward to `time`.
    ///
    /// The cursor never moves backwards: if the stored value is already past
    /// `time` it is kept. Returns the value stored after the update.
    pub fn advance_cursor(&self, time: f64, now: DateTime<Utc>) -> Result<f64, DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_cursor (id, last_time, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                last_time = MAX(sync_cursor.last_time, excluded.last_time),
                updated_at = excluded.updated_at",
            params![time, format_timestamp(now)],
        )?;
        let stored = conn.query_row("SELECT last_time FROM sync_cursor WHERE id = 1", [], |row| {
            row.get(0)
        })?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn cursor_is_absent_before_first_advance() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.cursor().unwrap().is_none());
    }

    #[test]
    fn advance_stores_exact_time() {
        let db = Database::open_in_memory().unwrap();
        let time = 1_736_937_000.123_456_7;

        let stored = db.advance_cursor(time, at(10)).unwrap();
        assert_eq!(stored.to_bits(), time.to_bits());

        let cursor = db.cursor().unwrap().unwrap();
        assert_eq!(cursor.last_time.to_bits(), time.to_bits());
        assert_eq!(cursor.updated_at, at(10));
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let db = Database::open_in_memory().unwrap();
        db.advance_cursor(200.0, at(10)).unwrap();

        let stored = db.advance_cursor(100.0, at(11)).unwrap();
        assert!((stored - 200.0).abs() < f64::EPSILON);

        let stored = db.advance_cursor(300.5, at(12)).unwrap();
        assert!((stored - 300.5).abs() < f64::EPSILON);

        let cursor = db.cursor().unwrap().unwrap();
        assert!((cursor.last_time - 300.5).abs() < f64::EPSILON);
        assert_eq!(cursor.updated_at, at(12));
    }

    #[test]
    fn cursor_table_holds_a_single_row() {
        let db = Database::open_in_memory().unwrap();
        db.advance_cursor(1.0, at(10)).unwrap();
        db.advance_cursor(2.0, at(11)).unwrap();

        let conn = db.conn().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM sync_cursor", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
