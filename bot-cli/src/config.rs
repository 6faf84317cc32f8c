//! Configuration loading for capybot.
//!
//! Configuration is loaded from an optional TOML file, then overlaid with
//! environment variables. Every section and field is optional; a missing
//! value disables the feature that depends on it.

use bot_client::Credentials;
use bot_core::TimeOfDay;
use bot_types::{IdError, RoomId};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Homeserver account and target room.
    pub matrix: MatrixConfig,
    /// Daily post schedule.
    pub schedule: ScheduleConfig,
    /// Image service.
    pub image: ImageConfig,
    /// Vote endpoints.
    pub votes: VotesConfig,
    /// Sync loop timings.
    pub sync: SyncConfig,
    /// Cursor persistence.
    pub state: StateConfig,
    /// Logging.
    pub log: LogConfig,
}

/// Homeserver configuration.
#[derive(Clone, Deserialize)]
pub struct MatrixConfig {
    /// Homeserver base URL.
    pub homeserver: Option<String>,
    /// Login user (local part or full ID).
    pub user: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Target room ID or alias.
    pub room: Option<String>,
    /// Device display name (default: capybot).
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

/// Schedule configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    /// Daily post time, `HH:MM` local time.
    pub time: Option<String>,
}

/// Image service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// URL returning today's image (default: https://capybara.lol/today).
    #[serde(default = "default_image_url")]
    pub url: String,
}

/// Vote endpoint configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VotesConfig {
    /// Endpoint for funny votes; unset disables them.
    pub funny_url: Option<String>,
    /// Endpoint for cute votes; unset disables them.
    pub cute_url: Option<String>,
}

/// Sync loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Long-poll timeout in seconds (default: 30).
    #[serde(default = "default_sync_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause after a failed sync in seconds (default: 5).
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

/// Cursor persistence configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateConfig {
    /// Cursor file (default: `<data dir>/state.json`).
    pub path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

// Default value functions
fn default_device_name() -> String {
    "capybot".to_string()
}

fn default_image_url() -> String {
    "https://capybara.lol/today".to_string()
}

fn default_sync_timeout_secs() -> u64 {
    30
}

fn default_retry_delay_secs() -> u64 {
    5
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver: None,
            user: None,
            password: None,
            room: None,
            device_name: default_device_name(),
        }
    }
}

impl std::fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("homeserver", &self.homeserver)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("room", &self.room)
            .field("device_name", &self.device_name)
            .finish()
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            url: default_image_url(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_sync_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Config {
    /// Load configuration: the TOML file, then the process environment.
    ///
    /// An explicit `path` must exist. Without one, the default config file
    /// is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Overlay environment variables; set, non-empty values win.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MATRIX_HOMESERVER") {
            self.matrix.homeserver = Some(v);
        }
        if let Some(v) = get("MATRIX_USER") {
            self.matrix.user = Some(v);
        }
        if let Some(v) = get("MATRIX_PASSWORD") {
            self.matrix.password = Some(v);
        }
        if let Some(v) = get("MATRIX_ROOM") {
            self.matrix.room = Some(v);
        }
        if let Some(v) = get("CAPYBOT_TIME") {
            self.schedule.time = Some(v);
        }
        if let Some(v) = get("CAPYBOT_STATE_FILE") {
            self.state.path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CAPYBOT_IMAGE_URL") {
            self.image.url = v;
        }
    }

    /// Homeserver URL and login credentials, if all three are configured.
    pub fn login(&self) -> Option<(String, Credentials)> {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());

        let homeserver = present(&self.matrix.homeserver)?;
        let user = present(&self.matrix.user)?;
        let password = present(&self.matrix.password)?;

        let credentials =
            Credentials::new(&user, &password).with_device_name(&self.matrix.device_name);
        Some((homeserver, credentials))
    }

    /// The target room, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if a room is set but is not a valid ID or alias.
    pub fn room(&self) -> Result<Option<RoomId>, ConfigError> {
        match self.matrix.room.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => RoomId::parse(raw).map(Some).map_err(ConfigError::InvalidRoom),
        }
    }

    /// The daily post time. An invalid time is logged and disables posting.
    pub fn schedule(&self) -> Option<TimeOfDay> {
        let raw = self.schedule.time.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse() {
            Ok(time) => Some(time),
            Err(e) => {
                tracing::warn!("Ignoring schedule: {}", e);
                None
            }
        }
    }

    /// Sync long-poll timeout.
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.timeout_secs)
    }

    /// Pause after a failed sync.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.sync.retry_delay_secs)
    }

    /// Cursor file location: `override_path`, then the configured path,
    /// then the platform data directory.
    pub fn state_path(&self, override_path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = override_path.or(self.state.path.as_deref()) {
            return Ok(path.to_path_buf());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join("state.json"))
            .ok_or(ConfigError::NoDataDir)
    }

    /// Log filter from config, if set.
    pub fn log_filter(&self) -> Option<&str> {
        self.log.filter.as_deref().filter(|f| !f.trim().is_empty())
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("lol", "capybara", "capybot")
}

/// Default config file location (`<config dir>/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// The configured room is malformed.
    #[error(transparent)]
    InvalidRoom(IdError),
    /// No state path configured and no home directory to default to.
    #[error("could not determine a data directory; set [state] path or CAPYBOT_STATE_FILE")]
    NoDataDir,
}
