//! On-disk cursor persistence.
//!
//! The whole [`Cursor`] is one JSON file. Saves go to a sibling temp file
//! which is restricted to the owner and then renamed over the target, so a
//! crash mid-write leaves the previous record intact.

use bot_types::Cursor;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cursor store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("cursor store I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The cursor could not be encoded.
    #[error("failed to encode cursor: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Loads and saves the cursor record.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cursor.
    ///
    /// A missing file is a fresh start. An unreadable record is logged and
    /// also treated as a fresh start.
    pub async fn load(&self) -> Result<Cursor, StoreError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No cursor at {}, starting fresh", self.path.display());
                return Ok(Cursor::zero());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_slice(&contents) {
            Ok(cursor) => Ok(cursor),
            Err(e) => {
                tracing::warn!(
                    "Ignoring corrupt cursor at {}: {}",
                    self.path.display(),
                    e
                );
                Ok(Cursor::zero())
            }
        }
    }

    /// Atomically replace the stored cursor.
    pub async fn save(&self, cursor: &Cursor) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(cursor)?;
        let tmp = self.tmp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| StoreError::Io { path, source }
        };

        tokio::fs::write(&tmp, &json).await.map_err(io_err(&tmp))?;
        set_file_permissions_0600(&tmp).await.map_err(io_err(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io_err(&self.path))?;

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cursor".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_types::{PostId, SyncToken};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample() -> Cursor {
        let mut cursor = Cursor::zero();
        cursor.advance(SyncToken::new("s42"));
        cursor.record_post(
            PostId::new("$abc"),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        );
        cursor
    }

    #[tokio::test]
    async fn missing_file_loads_zero() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("state.json"));
        assert!(store.load().await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("nested").join("state.json"));

        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), sample());
        assert!(!store.tmp_path().exists(), "temp file should be renamed away");
    }

    #[tokio::test]
    async fn corrupt_file_loads_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = CursorStore::new(&path);
        assert!(store.load().await.unwrap().is_zero());
    }

    #[tokio::test]
    async fn partial_record_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, br#"{"sync_token":"s7"}"#).unwrap();

        let cursor = CursorStore::new(&path).load().await.unwrap();
        assert_eq!(cursor.sync_token, Some(SyncToken::new("s7")));
        assert_eq!(cursor.last_post_id, None);
    }

    #[tokio::test]
    async fn save_overwrites_previous_record() {
        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("state.json"));

        store.save(&sample()).await.unwrap();
        let mut next = sample();
        next.advance(SyncToken::new("s43"));
        store.save(&next).await.unwrap();

        assert_eq!(
            store.load().await.unwrap().sync_token,
            Some(SyncToken::new("s43"))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("state.json"));
        store.save(&sample()).await.unwrap();

        let perms = std::fs::metadata(store.path()).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");
    }
}
