//! CLI subcommand implementations.

pub mod command;
pub mod leaderboard;
pub mod poll;
pub mod run;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};

use hb_api::{ChatClient, SummaryClient};
use hb_db::{Database, UpstreamStore};

use crate::Config;
use crate::pipeline::{Ingester, MilestoneDetector, Poller, Summarizer};

/// The poller and the handles it shares, kept so they can be closed.
pub(crate) struct Pipeline {
    db: Arc<Database>,
    upstream: Arc<UpstreamStore>,
    pub poller: Poller,
}

impl Pipeline {
    /// Wires the production capabilities into the pipeline services.
    pub fn connect(config: &Config, db: Database) -> Result<Self> {
        let settings = config.pipeline_settings()?;
        let upstream = UpstreamStore::open(&config.upstream_database_path).with_context(|| {
            format!(
                "failed to open upstream store {}",
                config.upstream_database_path.display()
            )
        })?;
        let summaries =
            SummaryClient::new(&config.summary_api_url).context("failed to create summary client")?;
        let chat = ChatClient::new(&config.chat_api_url, config.require_chat_token()?)
            .context("failed to create chat client")?;

        let db = Arc::new(db);
        let upstream = Arc::new(upstream);
        let ingester = Ingester::new(db.clone(), upstream.clone(), settings);
        let detector =
            MilestoneDetector::new(db.clone(), Arc::new(chat), settings.notification_period);
        let summarizer =
            Summarizer::new(db.clone(), upstream.clone(), Arc::new(summaries), detector);

        Ok(Self {
            db,
            upstream,
            poller: Poller::new(ingester, summarizer, settings.poll_interval),
        })
    }

    /// Drops the services and closes both database handles.
    pub fn close(self) -> Result<()> {
        let Self {
            db,
            upstream,
            poller,
        } = self;
        drop(poller);

        Arc::try_unwrap(upstream)
            .map_err(|_| anyhow!("upstream store still in use"))?
            .close()
            .context("failed to close upstream store")?;
        Arc::try_unwrap(db)
            .map_err(|_| anyhow!("database still in use"))?
            .close()
            .context("failed to close database")?;
        Ok(())
    }
}
