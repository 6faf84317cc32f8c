//! Show bot status.

use anyhow::{Context, Result};
use bot_client::CursorStore;
use bot_types::Cursor;
use std::fmt::Write;
use std::path::Path;

use crate::config::Config;

/// Run the status command.
pub async fn run(config: &Config, state_path: &Path) -> Result<()> {
    let cursor = CursorStore::new(state_path)
        .load()
        .await
        .context("Failed to read cursor")?;

    print!("{}", report(config, state_path, &cursor));
    Ok(())
}

/// Render the status report.
pub fn report(config: &Config, state_path: &Path, cursor: &Cursor) -> String {
    let mut out = String::new();
    let on_off = |enabled: bool| if enabled { "enabled" } else { "disabled" };

    let _ = writeln!(out, "=== capybot status ===");
    let _ = writeln!(out);

    let _ = writeln!(out, "Account:");
    match config.login() {
        Some((homeserver, credentials)) => {
            let _ = writeln!(out, "  Homeserver: {}", homeserver);
            let _ = writeln!(out, "  User:       {}", credentials.user);
        }
        None => {
            let _ = writeln!(out, "  NOT CONFIGURED (set MATRIX_HOMESERVER, MATRIX_USER, MATRIX_PASSWORD)");
        }
    }
    let room = match config.room() {
        Ok(Some(room)) => room.to_string(),
        Ok(None) => "none (publishing and reactions disabled)".to_string(),
        Err(e) => format!("INVALID ({})", e),
    };
    let _ = writeln!(out, "  Room:       {}", room);
    let _ = writeln!(out);

    let _ = writeln!(out, "Features:");
    let schedule = config
        .schedule()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "disabled".to_string());
    let _ = writeln!(out, "  Daily post:  {}", schedule);
    let _ = writeln!(out, "  Image:       {}", config.image.url);
    let _ = writeln!(out, "  Funny votes: {}", on_off(configured(&config.votes.funny_url)));
    let _ = writeln!(out, "  Cute votes:  {}", on_off(configured(&config.votes.cute_url)));
    let _ = writeln!(out);

    let _ = writeln!(out, "Cursor ({}):", state_path.display());
    if cursor.is_zero() {
        let _ = writeln!(out, "  EMPTY (fresh start)");
    } else {
        let show = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "  Sync token:     {}", show(cursor.sync_token.as_ref().map(|t| t.to_string())));
        let _ = writeln!(out, "  Last post:      {}", show(cursor.last_post_id.as_ref().map(|p| p.to_string())));
        let _ = writeln!(out, "  Last published: {}", show(cursor.last_published_on.map(|d| d.to_string())));
        let _ = writeln!(out, "  Last run:       {}", show(cursor.last_run_on.map(|d| d.to_string())));
    }

    out
}

fn configured(url: &Option<String>) -> bool {
    url.as_deref().is_some_and(|u| !u.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_types::{PostId, SyncToken};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn report_for_empty_setup() {
        let text = report(&Config::default(), Path::new("/tmp/state.json"), &Cursor::zero());
        assert!(text.contains("NOT CONFIGURED"));
        assert!(text.contains("Daily post:  disabled"));
        assert!(text.contains("Funny votes: disabled"));
        assert!(text.contains("EMPTY"));
    }

    #[test]
    fn report_shows_cursor_and_features() {
        let mut config: Config = toml::from_str(
            r#"
[matrix]
homeserver = "https://hs.example.org"
user = "capybot"
password = "hunter2"
room = "!daily:example.org"

[schedule]
time = "09:00"

[votes]
cute_url = "https://votes.example.org/cute"
"#,
        )
        .unwrap();
        config.apply_env(|_| None);

        let mut cursor = Cursor::zero();
        cursor.advance(SyncToken::new("s42"));
        cursor.record_post(PostId::new("$abc"), NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        cursor.record_run(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());

        let text = report(&config, Path::new("/tmp/state.json"), &cursor);
        assert!(text.contains("!daily:example.org"));
        assert!(text.contains("Daily post:  09:00"));
        assert!(text.contains("Cute votes:  enabled"));
        assert!(text.contains("s42"));
        assert!(text.contains("$abc"));
        assert!(text.contains("Last published: 2026-10-17"));
        assert!(text.contains("Last run:       2026-10-18"));
        assert!(!text.contains("hunter2"));
    }

    #[tokio::test]
    async fn status_reads_stored_cursor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut cursor = Cursor::zero();
        cursor.advance(SyncToken::new("s1"));
        CursorStore::new(&path).save(&cursor).await.unwrap();

        run(&Config::default(), &path).await.unwrap();
    }
}
