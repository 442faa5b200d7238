//! Slash-command text dispatch from the terminal.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;

use hb_core::Limit;
use hb_db::Database;

use crate::slash::handle_command;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &str,
    channel: &str,
    text: &[String],
    default_limit: Limit,
) -> Result<()> {
    let reply = handle_command(db, user, channel, &text.join(" "), default_limit, Utc::now())
        .context("failed to handle command")?;
    writeln!(writer, "{reply}")?;
    Ok(())
}
