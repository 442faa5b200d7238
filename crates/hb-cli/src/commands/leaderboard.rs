//! Leaderboard command.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;

use hb_core::{Limit, Period};
use hb_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    channel: &str,
    period: Period,
    limit: Limit,
) -> Result<()> {
    let text = crate::leaderboard::leaderboard(db, channel, period, limit, Utc::now())
        .context("failed to build leaderboard")?;
    writeln!(writer, "{text}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_empty_leaderboard() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        run(&mut output, &db, "C1", Period::Day, Limit::Top(10)).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "No coding activity recorded for today yet.\n"
        );
    }
}
