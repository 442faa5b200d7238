//! Heartbeat milestones CLI library.
//!
//! Wires the storage layer and HTTP clients into the polling pipeline, and
//! exposes the leaderboard and slash-command handlers used by the `hb` binary.

mod cli;
pub mod commands;
mod config;
pub mod leaderboard;
pub mod pipeline;
pub mod slash;

pub use cli::{Cli, Commands};
pub use config::Config;
