use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hb_cli::commands::{command, leaderboard, poll, run, status};
use hb_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(hb_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = hb_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Run) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            run::run(&config, db)?;
        }
        Some(Commands::Poll { json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            poll::run(&mut stdout, &config, db, *json)?;
        }
        Some(Commands::Leaderboard {
            channel,
            period,
            limit,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let limit = match limit {
                Some(limit) => *limit,
                None => config.default_limit()?,
            };
            leaderboard::run(&mut stdout, &db, channel, *period, limit)?;
            db.close().context("failed to close database")?;
        }
        Some(Commands::Command {
            user,
            channel,
            text,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            command::run(&mut stdout, &db, user, channel, text, config.default_limit()?)?;
            db.close().context("failed to close database")?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, &config.database_path)?;
            db.close().context("failed to close database")?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
