//! Capabilities the pipeline depends on.
//!
//! Each external system sits behind a trait so the services can be built with
//! real clients in production and with fakes in tests:
//!
//! - [`HeartbeatSource`]: the upstream activity store (change feed)
//! - [`CredentialDirectory`]: per-user API keys for the summary API
//! - [`SummaryFetcher`]: the upstream all-time summary API
//! - [`Notifier`]: outbound chat messages

use std::error::Error as StdError;

use async_trait::async_trait;
use thiserror::Error;

use crate::heartbeat::Heartbeat;
use crate::summary::Summary;

/// Boxed error carried by [`CapabilityError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure reported by an external capability.
#[derive(Debug, Error)]
#[error("{capability} failed: {source}")]
pub struct CapabilityError {
    pub capability: &'static str,
    #[source]
    pub source: BoxError,
}

impl CapabilityError {
    pub fn new(capability: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            capability,
            source: source.into(),
        }
    }
}

/// Read-only change feed over upstream heartbeats.
pub trait HeartbeatSource: Send + Sync {
    /// All heartbeats with event time strictly greater than `after`, newest first.
    fn heartbeats_after(&self, after: f64) -> Result<Vec<Heartbeat>, CapabilityError>;

    /// The `limit` most recent heartbeats, newest first.
    fn recent_heartbeats(&self, limit: usize) -> Result<Vec<Heartbeat>, CapabilityError>;
}

/// Resolves the summary API credential for a user.
pub trait CredentialDirectory: Send + Sync {
    /// Returns `None` when the user has no credential on file.
    fn api_key(&self, user_id: &str) -> Result<Option<String>, CapabilityError>;
}

/// Fetches a user's all-time cumulative totals.
#[async_trait]
pub trait SummaryFetcher: Send + Sync {
    async fn fetch_summary(&self, api_key: &str) -> Result<Summary, CapabilityError>;
}

/// Delivers a chat message to a channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), CapabilityError>;
}
