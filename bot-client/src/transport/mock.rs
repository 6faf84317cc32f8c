//! Mock transport for testing.
//!
//! Allows queueing sync batches and capturing uploads and sent messages for
//! verification.

use super::{ChatTransport, Credentials, LoginResult, Session, SyncBatch, TransportError};
use async_trait::async_trait;
use bot_types::{ContentUri, ImageMessage, PostId, RoomId, SyncToken, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An upload captured by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    /// Uploaded bytes.
    pub data: Vec<u8>,
    /// Declared content type.
    pub content_type: String,
    /// Declared file name.
    pub filename: String,
}

/// Mock transport for testing.
///
/// Allows queueing sync batches and capturing sent messages for verification.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    logged_in: bool,
    login_count: usize,
    calls: Vec<&'static str>,
    joined_rooms: Vec<RoomId>,
    sync_queue: VecDeque<SyncBatch>,
    sync_requests: Vec<Option<SyncToken>>,
    sync_filters: Vec<Option<RoomId>>,
    aliases: HashMap<RoomId, RoomId>,
    uploads: Vec<RecordedUpload>,
    sent_messages: Vec<(RoomId, ImageMessage)>,
    next_post: u64,
    fail_next_login: Option<String>,
    fail_all_logins: Option<String>,
    fail_next_join: Option<String>,
    fail_next_sync: Option<String>,
    fail_next_upload: Option<String>,
    fail_next_send: Option<String>,
    /// Pending session expiries, each optionally bound to one call name.
    expirations: VecDeque<(Option<&'static str>, String)>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch to be returned by the next `sync()` call.
    pub fn queue_sync(&self, batch: SyncBatch) {
        let mut inner = self.inner.lock().unwrap();
        inner.sync_queue.push_back(batch);
    }

    /// Get all messages that were sent.
    pub fn sent_messages(&self) -> Vec<(RoomId, ImageMessage)> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Get all uploads.
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        let inner = self.inner.lock().unwrap();
        inner.uploads.clone()
    }

    /// Get the `since` token of every sync request, in order.
    pub fn sync_requests(&self) -> Vec<Option<SyncToken>> {
        let inner = self.inner.lock().unwrap();
        inner.sync_requests.clone()
    }

    /// Get the room filter of every sync request, in order.
    pub fn sync_filters(&self) -> Vec<Option<RoomId>> {
        let inner = self.inner.lock().unwrap();
        inner.sync_filters.clone()
    }

    /// Get the names of all network calls made, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        let inner = self.inner.lock().unwrap();
        inner.calls.clone()
    }

    /// Number of login attempts.
    pub fn login_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.login_count
    }

    /// Rooms joined so far.
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        let inner = self.inner.lock().unwrap();
        inner.joined_rooms.clone()
    }

    /// Cause the next login() to fail with the given reason.
    pub fn fail_next_login(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_login = Some(reason.to_string());
    }

    /// Cause every login() to fail with the given reason.
    pub fn fail_all_logins(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_all_logins = Some(reason.to_string());
    }

    /// Make join_room() on `alias` return `room`.
    pub fn resolve_alias(&self, alias: RoomId, room: RoomId) {
        let mut inner = self.inner.lock().unwrap();
        inner.aliases.insert(alias, room);
    }

    /// Cause the next join_room() to fail.
    pub fn fail_next_join(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_join = Some(error.to_string());
    }

    /// Cause the next sync() to fail with a transient error.
    pub fn fail_next_sync(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_sync = Some(error.to_string());
    }

    /// Cause the next upload() to fail.
    pub fn fail_next_upload(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_upload = Some(error.to_string());
    }

    /// Cause the next send_message() to fail.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Invalidate the session: the next authenticated call is rejected.
    pub fn expire_session(&self, errcode: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.expirations.push_back((None, errcode.to_string()));
    }

    /// Invalidate the session at the next call named `call`.
    ///
    /// Expiries queue up, so a test can reject a fresh session again.
    pub fn expire_session_at(&self, call: &'static str, errcode: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.expirations.push_back((Some(call), errcode.to_string()));
    }
}

impl MockTransportInner {
    /// Common gate for authenticated calls.
    fn authorize(&mut self, call: &'static str) -> Result<(), TransportError> {
        self.calls.push(call);

        let expires_here = self
            .expirations
            .front()
            .is_some_and(|(at, _)| at.map_or(true, |at| at == call));
        if expires_here {
            if let Some((_, errcode)) = self.expirations.pop_front() {
                self.logged_in = false;
                return Err(TransportError::Unauthorized(errcode));
            }
        }

        if !self.logged_in {
            return Err(TransportError::NotLoggedIn);
        }

        Ok(())
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn login(&self, credentials: &Credentials) -> LoginResult {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("login");
        inner.login_count += 1;

        // Check for forced failure
        if let Some(reason) = inner.fail_next_login.take() {
            return LoginResult::Failed(reason);
        }
        if let Some(reason) = inner.fail_all_logins.clone() {
            return LoginResult::Failed(reason);
        }

        inner.logged_in = true;
        LoginResult::Authenticated(Session {
            user_id: UserId::new(format!("@{}:mock", credentials.user)),
            access_token: format!("token-{}", inner.login_count),
            device_id: Some(credentials.device_name.clone()),
        })
    }

    async fn join_room(&self, room: &RoomId) -> Result<RoomId, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.authorize("join")?;

        if let Some(error) = inner.fail_next_join.take() {
            return Err(TransportError::Http(error));
        }

        let joined = inner.aliases.get(room).cloned().unwrap_or_else(|| room.clone());
        if !inner.joined_rooms.contains(&joined) {
            inner.joined_rooms.push(joined.clone());
        }
        Ok(joined)
    }

    async fn sync(
        &self,
        since: Option<&SyncToken>,
        _timeout: Duration,
        room: Option<&RoomId>,
    ) -> Result<SyncBatch, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.authorize("sync")?;
        inner.sync_requests.push(since.cloned());
        inner.sync_filters.push(room.cloned());

        if let Some(error) = inner.fail_next_sync.take() {
            return Err(TransportError::Http(error));
        }

        // An empty queue behaves like a long-poll that timed out with no data.
        Ok(inner.sync_queue.pop_front().unwrap_or_else(|| SyncBatch {
            next_token: since.cloned(),
            ..SyncBatch::default()
        }))
    }

    async fn upload(
        &self,
        data: &[u8],
        content_type: &str,
        filename: &str,
    ) -> Result<ContentUri, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.authorize("upload")?;

        if let Some(error) = inner.fail_next_upload.take() {
            return Err(TransportError::Http(error));
        }

        inner.uploads.push(RecordedUpload {
            data: data.to_vec(),
            content_type: content_type.to_string(),
            filename: filename.to_string(),
        });
        Ok(ContentUri::new(format!("mxc://mock/{}", inner.uploads.len())))
    }

    async fn send_message(
        &self,
        room: &RoomId,
        content: &ImageMessage,
    ) -> Result<PostId, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.authorize("send")?;

        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::Http(error));
        }

        inner.next_post += 1;
        inner.sent_messages.push((room.clone(), content.clone()));
        Ok(PostId::new(format!("$post{}", inner.next_post)))
    }

    fn is_logged_in(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.logged_in
    }
}
