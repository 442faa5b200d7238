//! Per-(user, channel) notification preferences.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use hb_core::timestamp::format_timestamp;

use crate::{Database, DbError, parse_stored_timestamp};

/// Whether a user's milestones are posted to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPreference {
    pub user_id: String,
    pub channel_id: String,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Sets a user's preference for a channel, replacing any previous value.
    pub fn set_preference(
        &self,
        user_id: &str,
        channel_id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notification_preferences (user_id, channel_id, enabled, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, channel_id) DO UPDATE SET
                enabled = excluded.enabled,
                updated_at = excluded.updated_at",
            params![user_id, channel_id, enabled, format_timestamp(now)],
        )?;
        Ok(())
    }

    /// Returns a user's preference for a channel, if one was ever set.
    pub fn preference(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<Option<NotificationPreference>, DbError> {
        let conn = self.conn()?;
        let row: Option<(bool, String)> = conn
            .query_row(
                "SELECT enabled, updated_at FROM notification_preferences
                 WHERE user_id = ?1 AND channel_id = ?2",
                params![user_id, channel_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        drop(conn);

        row.map(|(enabled, updated_at)| {
            Ok(NotificationPreference {
                user_id: user_id.to_string(),
                channel_id: channel_id.to_string(),
                enabled,
                updated_at: parse_stored_timestamp("notification_preferences", &updated_at)?,
            })
        })
        .transpose()
    }

    /// Channels where the user has notifications enabled, sorted.
    pub fn enabled_channels(&self, user_id: &str) -> Result<Vec<String>, DbError> {
        self.string_column(
            "SELECT channel_id FROM notification_preferences
             WHERE user_id = ?1 AND enabled = 1 ORDER BY channel_id",
            user_id,
        )
    }

    /// Users who enabled notifications in the channel, sorted.
    pub fn enabled_users(&self, channel_id: &str) -> Result<Vec<String>, DbError> {
        self.string_column(
            "SELECT user_id FROM notification_preferences
             WHERE channel_id = ?1 AND enabled = 1 ORDER BY user_id",
            channel_id,
        )
    }

    fn string_column(&self, sql: &str, key: &str) -> Result<Vec<String>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let values = stmt
            .query_map(params![key], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    }
}
