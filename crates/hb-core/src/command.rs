//! Slash-command text parsing.
//!
//! Grammar: `on | off | status | leaderboard [day|week] [N|all] | help`.

use std::str::FromStr;

use thiserror::Error;

use crate::leaderboard::{LeaderboardArgError, Limit, Period};

/// Usage line shown for `help` and for unparseable input.
pub const USAGE: &str = "Usage: /hb on | off | status | leaderboard [day|week] [N|all]";

/// A parsed slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    /// Enable milestone notifications for the caller in this channel.
    On,
    /// Disable milestone notifications for the caller in this channel.
    Off,
    /// Report whether notifications are enabled.
    Status,
    /// Show the channel leaderboard.
    Leaderboard {
        period: Option<Period>,
        limit: Option<Limit>,
    },
    Help,
}

/// Errors from parsing slash-command text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error(transparent)]
    InvalidArgument(#[from] LeaderboardArgError),
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

impl FromStr for SlashCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let Some(action) = tokens.next() else {
            return Ok(Self::Help);
        };
        let args: Vec<&str> = tokens.collect();

        match action.to_ascii_lowercase().as_str() {
            "on" => no_args(Self::On, &args),
            "off" => no_args(Self::Off, &args),
            "status" => no_args(Self::Status, &args),
            "help" => Ok(Self::Help),
            "leaderboard" | "lb" => parse_leaderboard(&args),
            _ => Err(ParseCommandError::UnknownAction(action.to_string())),
        }
    }
}

fn no_args(command: SlashCommand, args: &[&str]) -> Result<SlashCommand, ParseCommandError> {
    match args.first() {
        Some(extra) => Err(ParseCommandError::UnexpectedArgument((*extra).to_string())),
        None => Ok(command),
    }
}

fn parse_leaderboard(args: &[&str]) -> Result<SlashCommand, ParseCommandError> {
    let mut period = None;
    let mut limit = None;
    for arg in args {
        if period.is_none() && limit.is_none() {
            if let Ok(parsed) = arg.parse::<Period>() {
                period = Some(parsed);
                continue;
            }
        }
        if limit.is_none() {
            limit = Some(arg.parse::<Limit>()?);
            continue;
        }
        return Err(ParseCommandError::UnexpectedArgument((*arg).to_string()));
    }
    Ok(SlashCommand::Leaderboard { period, limit })
}
