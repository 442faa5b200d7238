//! Long-running poll loop.

use anyhow::{Context, Result};

use hb_db::Database;

use super::Pipeline;
use crate::Config;

/// Polls until Ctrl-C, then closes the database handles.
pub fn run(config: &Config, db: Database) -> Result<()> {
    let pipeline = Pipeline::connect(config, db)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;

    runtime.block_on(pipeline.poller.run_with_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }));

    pipeline.close()
}
