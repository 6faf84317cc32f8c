//! The persisted cursor record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{PostId, SyncToken};

/// Everything capybot persists across restarts.
///
/// Written as a single record so the sync position and the last post can
/// never drift apart on disk. The zero value (all fields `None`) is what a
/// fresh installation starts with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Last sync position handed out by the homeserver.
    #[serde(default)]
    pub sync_token: Option<SyncToken>,
    /// Identifier of the last post the homeserver acknowledged.
    #[serde(default)]
    pub last_post_id: Option<PostId>,
    /// Local date of the last successful publish.
    #[serde(default)]
    pub last_published_on: Option<NaiveDate>,
    /// Local date the daily job last fired, whatever its outcome.
    #[serde(default)]
    pub last_run_on: Option<NaiveDate>,
}

impl Cursor {
    /// The zero cursor.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Whether nothing has ever been recorded.
    pub fn is_zero(&self) -> bool {
        self.sync_token.is_none()
            && self.last_post_id.is_none()
            && self.last_published_on.is_none()
            && self.last_run_on.is_none()
    }

    /// Advance the sync position.
    pub fn advance(&mut self, token: SyncToken) {
        self.sync_token = Some(token);
    }

    /// Record that the daily job fired on `on`.
    ///
    /// Written before the job does any I/O, so a failed run still counts
    /// for the day.
    pub fn record_run(&mut self, on: NaiveDate) {
        self.last_run_on = Some(on);
    }

    /// The last day the daily job is known to have handled.
    ///
    /// Records written before `last_run_on` existed fall back to the
    /// publish date.
    pub fn last_handled_on(&self) -> Option<NaiveDate> {
        self.last_run_on.max(self.last_published_on)
    }

    /// Record an acknowledged post.
    ///
    /// Only call this with an ID the homeserver returned from a successful
    /// send.
    pub fn record_post(&mut self, post: PostId, on: NaiveDate) {
        self.last_post_id = Some(post);
        self.last_published_on = Some(on);
    }
}
