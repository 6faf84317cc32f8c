//! Matrix client-server API transport.
//!
//! A thin HTTP client over the handful of v3 endpoints capybot uses:
//! password login, join, sync, media upload and room send. The session is
//! kept inside the transport; calls made without one fail with
//! [`TransportError::NotLoggedIn`].

use super::{ChatTransport, Credentials, LoginResult, Session, SyncBatch, TransportError};
use async_trait::async_trait;
use bot_types::{
    ContentUri, ImageMessage, InboundEvent, PostId, RoomId, SyncToken, UserId,
    ROOM_MESSAGE_EVENT_TYPE,
};
use reqwest::{header, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Extra time allowed on top of the long-poll timeout before the HTTP
/// request itself is abandoned.
const SYNC_GRACE: Duration = Duration::from_secs(15);

/// Timeout for every call other than sync.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of timeline events requested per room per sync.
const TIMELINE_LIMIT: u32 = 50;

/// Maximum length of an error body kept in [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Error code the homeserver uses for an invalid or expired token.
const UNKNOWN_TOKEN: &str = "M_UNKNOWN_TOKEN";

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::InvalidResponse(e.to_string())
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

/// Transport speaking the Matrix client-server API over HTTPS.
pub struct MatrixTransport {
    homeserver: Url,
    http: reqwest::Client,
    session: Mutex<Option<Session>>,
}

impl std::fmt::Debug for MatrixTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixTransport")
            .field("homeserver", &self.homeserver.as_str())
            .field("logged_in", &self.is_logged_in())
            .finish()
    }
}

impl MatrixTransport {
    /// Create a transport for a homeserver base URL (e.g. `https://matrix.org`).
    pub fn new(homeserver: &str) -> Result<Self, TransportError> {
        let homeserver = Url::parse(homeserver)
            .map_err(|e| TransportError::Http(format!("invalid homeserver url: {}", e)))?;
        if homeserver.cannot_be_a_base() {
            return Err(TransportError::Http(format!(
                "invalid homeserver url: {}",
                homeserver
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("capybot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            homeserver,
            http,
            session: Mutex::new(None),
        })
    }

    /// Build an endpoint URL from path segments (each segment is escaped).
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.homeserver.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn access_token(&self) -> Result<String, TransportError> {
        let session = self
            .session
            .lock()
            .map_err(|_| TransportError::NotLoggedIn)?;
        session
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(TransportError::NotLoggedIn)
    }

    fn store_session(&self, session: Option<Session>) {
        if let Ok(mut slot) = self.session.lock() {
            *slot = session;
        }
    }

    /// Turn a non-success response into an error; drop the session on 401.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let errcode = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|e| e.errcode);

        if status == StatusCode::UNAUTHORIZED || errcode.as_deref() == Some(UNKNOWN_TOKEN) {
            self.store_session(None);
            return Err(TransportError::Unauthorized(
                errcode.unwrap_or_else(|| status.to_string()),
            ));
        }

        Err(TransportError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    async fn try_login(&self, credentials: &Credentials) -> Result<Session, TransportError> {
        let url = self.endpoint(&["_matrix", "client", "v3", "login"]);
        let body = json!({
            "type": "m.login.password",
            "identifier": { "type": "m.id.user", "user": credentials.user },
            "password": credentials.password,
            "initial_device_display_name": credentials.device_name,
        });

        let response = self
            .http
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        let login: LoginResponse = self.check(response).await?.json().await?;

        Ok(Session {
            user_id: UserId::new(login.user_id),
            access_token: login.access_token,
            device_id: login.device_id,
        })
    }
}

/// Server-side sync filter restricting the response to one room's timeline.
pub fn sync_filter(room: &RoomId) -> String {
    json!({
        "presence": { "types": [] },
        "account_data": { "types": [] },
        "room": {
            "rooms": [room.as_str()],
            "timeline": { "limit": TIMELINE_LIMIT },
            "state": { "lazy_load_members": true },
            "ephemeral": { "types": [] },
            "account_data": { "types": [] }
        }
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    errcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user_id: String,
    access_token: String,
    device_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    content_uri: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
struct SyncRooms {
    #[serde(default)]
    join: HashMap<String, JoinedRoom>,
}

#[derive(Debug, Default, Deserialize)]
struct JoinedRoom {
    #[serde(default)]
    timeline: Timeline,
}

#[derive(Debug, Default, Deserialize)]
struct Timeline {
    #[serde(default)]
    events: Vec<Value>,
}

impl SyncResponse {
    fn into_batch(self) -> SyncBatch {
        let joined = self
            .rooms
            .join
            .into_iter()
            .map(|(room, joined)| {
                let events = joined
                    .timeline
                    .events
                    .iter()
                    .map(InboundEvent::from_json)
                    .collect();
                (RoomId::new(room), events)
            })
            .collect();

        SyncBatch {
            next_token: Some(SyncToken::new(self.next_batch)),
            joined,
        }
    }
}

#[async_trait]
impl ChatTransport for MatrixTransport {
    async fn login(&self, credentials: &Credentials) -> LoginResult {
        match self.try_login(credentials).await {
            Ok(session) => {
                tracing::info!(
                    "Logged in as {} (device {:?})",
                    session.user_id,
                    session.device_id
                );
                self.store_session(Some(session.clone()));
                LoginResult::Authenticated(session)
            }
            Err(e) => {
                self.store_session(None);
                LoginResult::Failed(e.to_string())
            }
        }
    }

    async fn join_room(&self, room: &RoomId) -> Result<RoomId, TransportError> {
        let token = self.access_token()?;
        let url = self.endpoint(&["_matrix", "client", "v3", "join", room.as_str()]);

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({}))
            .send()
            .await?;
        let joined: JoinResponse = self.check(response).await?.json().await?;

        Ok(RoomId::new(joined.room_id))
    }

    async fn sync(
        &self,
        since: Option<&SyncToken>,
        timeout: Duration,
        room: Option<&RoomId>,
    ) -> Result<SyncBatch, TransportError> {
        let token = self.access_token()?;
        let url = self.endpoint(&["_matrix", "client", "v3", "sync"]);

        let mut query: Vec<(&str, String)> = vec![("timeout", timeout.as_millis().to_string())];
        if let Some(since) = since {
            query.push(("since", since.as_str().to_string()));
        }
        if let Some(room) = room {
            query.push(("filter", sync_filter(room)));
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&query)
            .timeout(timeout + SYNC_GRACE)
            .send()
            .await?;
        let sync: SyncResponse = self.check(response).await?.json().await?;

        Ok(sync.into_batch())
    }

    async fn upload(
        &self,
        data: &[u8],
        content_type: &str,
        filename: &str,
    ) -> Result<ContentUri, TransportError> {
        let token = self.access_token()?;
        let url = self.endpoint(&["_matrix", "media", "v3", "upload"]);

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .query(&[("filename", filename)])
            .header(header::CONTENT_TYPE, content_type)
            .timeout(REQUEST_TIMEOUT)
            .body(data.to_vec())
            .send()
            .await?;
        let uploaded: UploadResponse = self.check(response).await?.json().await?;

        Ok(ContentUri::new(uploaded.content_uri))
    }

    async fn send_message(
        &self,
        room: &RoomId,
        content: &ImageMessage,
    ) -> Result<PostId, TransportError> {
        let token = self.access_token()?;
        let txn_id = uuid::Uuid::new_v4().to_string();
        let url = self.endpoint(&[
            "_matrix",
            "client",
            "v3",
            "rooms",
            room.as_str(),
            "send",
            ROOM_MESSAGE_EVENT_TYPE,
            txn_id.as_str(),
        ]);

        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(content)
            .send()
            .await?;
        let sent: SendResponse = self.check(response).await?.json().await?;

        Ok(PostId::new(sent.event_id))
    }

    fn is_logged_in(&self) -> bool {
        self.session
            .lock()
            .map(|session| session.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> MatrixTransport {
        MatrixTransport::new("https://matrix.example.org").unwrap()
    }

    #[test]
    fn rejects_invalid_homeserver() {
        assert!(MatrixTransport::new("not a url").is_err());
        assert!(MatrixTransport::new("mailto:bot@example.org").is_err());
    }

    #[test]
    fn endpoint_appends_segments() {
        let url = transport().endpoint(&["_matrix", "client", "v3", "sync"]);
        assert_eq!(url.as_str(), "https://matrix.example.org/_matrix/client/v3/sync");
    }

    #[test]
    fn endpoint_respects_base_path() {
        let transport = MatrixTransport::new("https://example.org/matrix/").unwrap();
        let url = transport.endpoint(&["_matrix", "client", "v3", "login"]);
        assert_eq!(url.as_str(), "https://example.org/matrix/_matrix/client/v3/login");
    }

    #[test]
    fn endpoint_escapes_room_alias() {
        let url = transport().endpoint(&["_matrix", "client", "v3", "join", "#capy:example.org"]);
        assert_eq!(
            url.as_str(),
            "https://matrix.example.org/_matrix/client/v3/join/%23capy:example.org"
        );
    }

    #[test]
    fn not_logged_in_until_login() {
        let transport = transport();
        assert!(!transport.is_logged_in());
        assert!(matches!(
            transport.access_token(),
            Err(TransportError::NotLoggedIn)
        ));
    }

    #[test]
    fn sync_filter_targets_room() {
        let filter: Value =
            serde_json::from_str(&sync_filter(&RoomId::new("!abc:example.org"))).unwrap();
        assert_eq!(filter["room"]["rooms"][0], "!abc:example.org");
        assert_eq!(filter["room"]["timeline"]["limit"], TIMELINE_LIMIT);
    }

    #[test]
    fn sync_response_becomes_batch_in_order() {
        let raw = json!({
            "next_batch": "s72595_4483_1934",
            "rooms": {
                "join": {
                    "!abc:example.org": {
                        "timeline": {
                            "events": [
                                { "type": "m.room.message", "event_id": "$m1", "content": {} },
                                {
                                    "type": "m.reaction",
                                    "event_id": "$r1",
                                    "content": {
                                        "m.relates_to": {
                                            "rel_type": "m.annotation",
                                            "event_id": "$post",
                                            "key": "😂"
                                        }
                                    }
                                }
                            ]
                        }
                    }
                }
            }
        });

        let response: SyncResponse = serde_json::from_value(raw).unwrap();
        let batch = response.into_batch();
        let room = RoomId::new("!abc:example.org");

        assert_eq!(batch.next_token, Some(SyncToken::new("s72595_4483_1934")));
        let events = batch.events_for(&room);
        assert_eq!(events.len(), 2);
        assert!(!events[0].is_reaction());
        assert!(events[1].is_reaction());
        assert_eq!(events[1].related_post_id, Some(PostId::new("$post")));
    }

    #[test]
    fn sync_response_without_rooms_is_empty() {
        let response: SyncResponse =
            serde_json::from_value(json!({ "next_batch": "s1" })).unwrap();
        let batch = response.into_batch();
        assert_eq!(batch.event_count(), 0);
        assert_eq!(batch.next_token, Some(SyncToken::new("s1")));
    }
}
