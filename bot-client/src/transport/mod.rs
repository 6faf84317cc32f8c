//! Homeserver transport abstraction for capybot.
//!
//! This module provides a pluggable transport layer that abstracts the chat
//! network (Matrix over HTTP, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and session-oriented:
//! - `login()` establishes a session and reports it as a [`LoginResult`]
//! - `join_room()` makes sure the bot is a member of the target room
//! - `sync()` long-polls for timeline events since a [`SyncToken`]
//! - `upload()` stores media and returns its [`ContentUri`]
//! - `send_message()` posts content and returns the server-assigned [`PostId`]
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.login(&credentials).await;
//! let batch = transport.sync(None, Duration::from_secs(30), Some(&room)).await?;
//! ```

mod matrix;
mod mock;

pub use matrix::MatrixTransport;
pub use mock::{MockTransport, RecordedUpload};

use async_trait::async_trait;
use bot_types::{ContentUri, ImageMessage, InboundEvent, PostId, RoomId, SyncToken, UserId};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The homeserver rejected the session (401 / `M_UNKNOWN_TOKEN`).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No session yet.
    #[error("not logged in")]
    NotLoggedIn,

    /// Request could not be completed.
    #[error("http error: {0}")]
    Http(String),

    /// The homeserver answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated by the transport).
        body: String,
    },

    /// Response body was not what the API promises.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Request timed out.
    #[error("request timeout")]
    Timeout,
}

impl TransportError {
    /// Whether this error means the session is gone and a new login is needed.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::NotLoggedIn)
    }
}

/// Account credentials for the chat network.
#[derive(Clone)]
pub struct Credentials {
    /// Local part or full user ID.
    pub user: String,
    /// Account password.
    pub password: String,
    /// Display name for the device created by login.
    pub device_name: String,
}

impl Credentials {
    /// Create credentials with the default device name.
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
            device_name: "capybot".to_string(),
        }
    }

    /// Set the device name.
    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name = name.to_string();
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("device_name", &self.device_name)
            .finish()
    }
}

/// An authenticated session.
#[derive(Clone)]
pub struct Session {
    /// Fully qualified user ID.
    pub user_id: UserId,
    /// Bearer token for subsequent calls.
    pub access_token: String,
    /// Device created by the login, if reported.
    pub device_id: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Outcome of a login attempt.
#[derive(Debug, Clone)]
pub enum LoginResult {
    /// The homeserver issued a session.
    Authenticated(Session),
    /// Login was refused or could not be performed.
    Failed(String),
}

/// One sync step's worth of data.
#[derive(Debug, Clone, Default)]
pub struct SyncBatch {
    /// Position to pass as `since` next time.
    pub next_token: Option<SyncToken>,
    /// New timeline events per joined room, in arrival order.
    pub joined: HashMap<RoomId, Vec<InboundEvent>>,
}

impl SyncBatch {
    /// Create an empty batch ending at `next_token`.
    pub fn new(next_token: SyncToken) -> Self {
        Self {
            next_token: Some(next_token),
            joined: HashMap::new(),
        }
    }

    /// Add events for a room (builder style, for tests and mocks).
    pub fn with_events(mut self, room: RoomId, events: Vec<InboundEvent>) -> Self {
        self.joined.entry(room).or_default().extend(events);
        self
    }

    /// Events of one room, empty if the room had none.
    pub fn events_for(&self, room: &RoomId) -> &[InboundEvent] {
        self.joined.get(room).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of events across rooms.
    pub fn event_count(&self) -> usize {
        self.joined.values().map(Vec::len).sum()
    }
}

/// Transport trait for talking to the homeserver.
///
/// Implementations handle the underlying protocol (Matrix client-server
/// API, mock, etc).
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Log in and keep the resulting session for later calls.
    async fn login(&self, credentials: &Credentials) -> LoginResult;

    /// Join a room (no-op if already joined); returns the canonical room ID.
    async fn join_room(&self, room: &RoomId) -> Result<RoomId, TransportError>;

    /// Wait up to `timeout` for events newer than `since`.
    ///
    /// `room` narrows the server-side filter to the target room.
    async fn sync(
        &self,
        since: Option<&SyncToken>,
        timeout: Duration,
        room: Option<&RoomId>,
    ) -> Result<SyncBatch, TransportError>;

    /// Upload media bytes.
    async fn upload(
        &self,
        data: &[u8],
        content_type: &str,
        filename: &str,
    ) -> Result<ContentUri, TransportError>;

    /// Send an image message to a room.
    async fn send_message(
        &self,
        room: &RoomId,
        content: &ImageMessage,
    ) -> Result<PostId, TransportError>;

    /// Check if a session is held.
    fn is_logged_in(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("capybot", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(creds.device_name, "capybot");
    }

    #[test]
    fn session_debug_redacts_token() {
        let session = Session {
            user_id: UserId::new("@capybot:example.org"),
            access_token: "syt_secret".into(),
            device_id: Some("DEV".into()),
        };
        let debug = format!("{:?}", session);
        assert!(!debug.contains("syt_secret"));
    }

    #[test]
    fn session_lost_classification() {
        assert!(TransportError::Unauthorized("M_UNKNOWN_TOKEN".into()).is_session_lost());
        assert!(TransportError::NotLoggedIn.is_session_lost());
        assert!(!TransportError::Timeout.is_session_lost());
        assert!(!TransportError::Status {
            status: 500,
            body: String::new()
        }
        .is_session_lost());
    }

    #[test]
    fn batch_events_for_unknown_room_is_empty() {
        let room = RoomId::new("!a:example.org");
        let other = RoomId::new("!b:example.org");
        let batch = SyncBatch::new(SyncToken::new("s1"))
            .with_events(room.clone(), vec![InboundEvent::other(), InboundEvent::other()]);

        assert_eq!(batch.events_for(&room).len(), 2);
        assert!(batch.events_for(&other).is_empty());
        assert_eq!(batch.event_count(), 2);
    }
}
