//! Core domain logic for heartbeat milestones.
//!
//! This crate contains the fundamental types and logic for:
//! - Heartbeats: upstream activity records and their validation
//! - Milestones: per-project watermark arithmetic and notification messages
//! - Leaderboards: snapshot diffing, ranking, and rendering
//! - Slash commands: parsing the chat command surface
//! - Ports: traits for the external capabilities the pipeline calls

pub mod command;
pub mod duration;
pub mod heartbeat;
pub mod leaderboard;
pub mod milestone;
pub mod ports;
pub mod summary;
pub mod timestamp;

pub use command::{ParseCommandError, SlashCommand, USAGE};
pub use duration::format_duration;
pub use heartbeat::{Heartbeat, HeartbeatError, distinct_users, newest_valid_time};
pub use leaderboard::{Limit, Period, ProjectActivity, UserActivity};
pub use milestone::{Decision, InvalidPeriod, Milestone, NotificationPeriod, Watermark};
pub use ports::{
    CapabilityError, CredentialDirectory, HeartbeatSource, Notifier, SummaryFetcher,
};
pub use summary::{Summary, SummaryItem, SummarySnapshot};

// Re-export async_trait for capability implementors
pub use async_trait::async_trait;
