//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use hb_core::{Limit, Period};

/// Coding milestone notifier.
///
/// Mirrors heartbeats from an upstream time tracker, celebrates every
/// configured period of coding per project in chat, and renders channel
/// leaderboards.
#[derive(Debug, Parser)]
#[command(name = "hb", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the polling loop until interrupted.
    Run,

    /// Run a single poll tick and print what it did.
    Poll {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a channel's leaderboard.
    Leaderboard {
        /// Channel whose opted-in users are ranked.
        #[arg(long)]
        channel: String,

        /// Time window: day or week.
        #[arg(long, default_value = "day")]
        period: Period,

        /// Number of users to show, or "all".
        #[arg(long)]
        limit: Option<Limit>,
    },

    /// Dispatch slash-command text as if sent from chat.
    Command {
        /// User sending the command.
        #[arg(long)]
        user: String,

        /// Channel the command was sent in.
        #[arg(long)]
        channel: String,

        /// Command text, e.g. `on` or `leaderboard week 5`.
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Show cursor position and table sizes.
    Status,
}
