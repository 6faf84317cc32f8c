//! # capybot
//!
//! Posts a daily capybara picture to a Matrix room and forwards the
//! reactions it gets as votes.
//!
//! ## Commands
//!
//! - `run`: Run the bot loop (default)
//! - `post`: Publish today's image once and exit
//! - `status`: Show configuration and the stored cursor
//!
//! ## Example
//!
//! ```bash
//! export MATRIX_HOMESERVER=https://matrix.org
//! export MATRIX_USER=capybot
//! export MATRIX_PASSWORD=...
//! export MATRIX_ROOM='#capybaras:matrix.org'
//! export CAPYBOT_TIME=09:00
//!
//! # Run forever
//! capybot run
//!
//! # Post right now
//! capybot post
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{post, run, status};
use config::Config;

/// Daily capybara bot for Matrix.
#[derive(Parser, Debug)]
#[command(name = "capybot")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Cursor file (overrides [state] path and CAPYBOT_STATE_FILE)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot loop
    Run,

    /// Publish today's image once and exit
    Post,

    /// Show configuration and the stored cursor
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(config.log_filter());

    let state_path = config
        .state_path(cli.state_file.as_deref())
        .context("Failed to resolve cursor location")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run::run(&config, &state_path).await?,
        Commands::Post => post::run(&config, &state_path).await?,
        Commands::Status => status::run(&config, &state_path).await?,
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the config filter.
fn init_logging(filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
