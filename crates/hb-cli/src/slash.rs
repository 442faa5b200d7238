//! Slash-command dispatch.

use chrono::{DateTime, Utc};

use hb_core::{Limit, SlashCommand, USAGE};
use hb_db::{Database, DbError};

use crate::leaderboard::leaderboard;

/// Records whether a user's milestones are posted to a channel.
pub fn set_preference(
    db: &Database,
    user_id: &str,
    channel_id: &str,
    enabled: bool,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    db.set_preference(user_id, channel_id, enabled, now)?;
    tracing::info!(user_id, channel_id, enabled, "notification preference updated");
    Ok(())
}

/// Whether a user's milestones are posted to a channel; unset reads as off.
pub fn get_preference(db: &Database, user_id: &str, channel_id: &str) -> Result<bool, DbError> {
    Ok(db
        .preference(user_id, channel_id)?
        .is_some_and(|preference| preference.enabled))
}

/// Handles slash-command `text` sent by `user_id` in `channel_id` and returns
/// the reply.
///
/// Unparseable text is answered with the usage line rather than an error.
pub fn handle_command(
    db: &Database,
    user_id: &str,
    channel_id: &str,
    text: &str,
    default_limit: Limit,
    now: DateTime<Utc>,
) -> Result<String, DbError> {
    let command = match text.parse::<SlashCommand>() {
        Ok(command) => command,
        Err(err) => {
            tracing::debug!(text, error = %err, "unrecognised slash command");
            return Ok(USAGE.to_string());
        }
    };

    let reply = match command {
        SlashCommand::On => {
            set_preference(db, user_id, channel_id, true, now)?;
            "Milestone notifications enabled in this channel.".to_string()
        }
        SlashCommand::Off => {
            set_preference(db, user_id, channel_id, false, now)?;
            "Milestone notifications disabled in this channel.".to_string()
        }
        SlashCommand::Status => {
            let state = if get_preference(db, user_id, channel_id)? {
                "enabled"
            } else {
                "disabled"
            };
            format!("Milestone notifications are {state} in this channel.")
        }
        SlashCommand::Leaderboard { period, limit } => leaderboard(
            db,
            channel_id,
            period.unwrap_or_default(),
            limit.unwrap_or(default_limit),
            now,
        )?,
        SlashCommand::Help => USAGE.to_string(),
    };
    Ok(reply)
}
