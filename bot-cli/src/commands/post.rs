//! Publish today's image once.

use anyhow::{Context, Result};
use std::path::Path;

use super::build_bot;
use crate::config::Config;

/// Run the post command.
pub async fn run(config: &Config, state_path: &Path) -> Result<()> {
    let mut bot = build_bot(config, state_path)
        .await?
        .context("Missing MATRIX_HOMESERVER, MATRIX_USER or MATRIX_PASSWORD")?;

    println!("Fetching {}...", config.image.url);
    let post = bot.post_once().await.context("Failed to post image")?;

    println!("Posted {}", post);
    Ok(())
}
