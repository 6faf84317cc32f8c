//! Run the bot loop.

use anyhow::{Context, Result};
use std::path::Path;

use super::build_bot;
use crate::config::Config;

/// Run the run command.
///
/// Loops until login fails for good or the process is interrupted.
pub async fn run(config: &Config, state_path: &Path) -> Result<()> {
    let Some(mut bot) = build_bot(config, state_path).await? else {
        tracing::error!(
            "Missing MATRIX_HOMESERVER, MATRIX_USER or MATRIX_PASSWORD; nothing to do"
        );
        return Ok(());
    };

    match bot.job() {
        Some(job) => tracing::info!("Daily post at {}", job.time_of_day()),
        None => tracing::info!("Daily post disabled"),
    }
    tracing::info!("Cursor at {}", state_path.display());

    tokio::select! {
        result = bot.run() => result.context("Bot stopped"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
