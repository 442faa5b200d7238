//! Channel leaderboards built from stored snapshots.

use chrono::{DateTime, Utc};

use hb_core::leaderboard::{aggregate, render};
use hb_core::{Limit, Period, Summary};
use hb_db::{Database, DbError};

/// Renders the leaderboard of a channel's opted-in users for `period`.
pub fn leaderboard(
    db: &Database,
    channel_id: &str,
    period: Period,
    limit: Limit,
    now: DateTime<Utc>,
) -> Result<String, DbError> {
    let start = period.window_start(now);
    let users = db.enabled_users(channel_id)?;

    let mut histories: Vec<(String, Vec<Summary>)> = Vec::with_capacity(users.len());
    for user_id in users {
        let snapshots = match db.snapshots_between(&user_id, start, now) {
            Ok(snapshots) => snapshots,
            Err(err @ DbError::SnapshotPayload { .. }) => {
                tracing::warn!(user_id = %user_id, error = %err, "skipping user with unreadable snapshot");
                continue;
            }
            Err(err) => return Err(err),
        };
        let summaries = snapshots
            .into_iter()
            .map(|snapshot| snapshot.summary)
            .collect();
        histories.push((user_id, summaries));
    }

    tracing::debug!(channel_id, %period, %limit, users = histories.len(), "building leaderboard");
    Ok(render(period, &aggregate(&histories, limit)))
}
