//! CLI command implementations.

pub mod post;
pub mod run;
pub mod status;

use anyhow::{Context, Result};
use bot_client::{
    Bot, BotConfig, CursorStore, HttpImageSource, HttpVoteForwarder, MatrixTransport, SystemClock,
};
use std::path::Path;

use crate::config::Config;

/// The production bot.
pub type LiveBot = Bot<MatrixTransport, HttpImageSource, HttpVoteForwarder, SystemClock>;

/// Wire a bot from configuration.
///
/// Returns `None` when login credentials are incomplete.
pub async fn build_bot(config: &Config, state_path: &Path) -> Result<Option<LiveBot>> {
    let Some((homeserver, credentials)) = config.login() else {
        return Ok(None);
    };

    let mut bot_config = BotConfig::new(credentials)
        .with_sync_timeout(config.sync_timeout())
        .with_retry_delay(config.retry_delay());
    match config.room()? {
        Some(room) => bot_config = bot_config.with_room(room),
        None => tracing::warn!("No room configured, publishing and reactions disabled"),
    }
    if let Some(time) = config.schedule() {
        bot_config = bot_config.with_schedule(time);
    }

    let transport = MatrixTransport::new(&homeserver).context("Invalid homeserver")?;
    let source = HttpImageSource::new(config.image.url.clone());
    let votes = HttpVoteForwarder::new(config.votes.funny_url.clone(), config.votes.cute_url.clone());

    let bot = Bot::new(
        bot_config,
        transport,
        source,
        votes,
        SystemClock,
        CursorStore::new(state_path),
    )
    .await
    .context("Failed to load cursor")?;

    Ok(Some(bot))
}
