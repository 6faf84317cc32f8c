//! Bot - the sync/dispatch loop driver.
//!
//! [`Bot`] owns the in-memory [`Cursor`] and interprets the actions of the
//! pure loop state machine (from capybot-core) by performing the actual I/O
//! through its collaborators.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────── Clock
//!            │
//! Bot ───────┼──► ChatTransport ──► homeserver
//!  │         ├──► ImageSource   ──► image service
//!  │         └──► VoteForwarder ──► scoring service
//!  ↓
//! capybot-core (LoopState, ScheduledJob, classify)
//! ```
//!
//! Everything runs sequentially on one task. The only suspension points are
//! the sync long-poll, the publish calls and vote forwarding.
//!
//! # Example
//!
//! ```ignore
//! let mut bot = Bot::new(config, transport, source, votes, SystemClock, store).await?;
//! bot.run().await?;
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use bot_core::{classify_batch, LoopAction, LoopEvent, LoopState, ScheduledJob, TimeOfDay};
use bot_types::{Cursor, PostId, RoomId};
use thiserror::Error;

use crate::clock::Clock;
use crate::publisher::{publish, PublishError};
use crate::source::{FetchError, ImageSource};
use crate::store::{CursorStore, StoreError};
use crate::transport::{ChatTransport, Credentials, LoginResult, SyncBatch, TransportError};
use crate::votes::VoteForwarder;

/// Default long-poll timeout for a sync step.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Default pause after a failed sync.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Bot errors.
#[derive(Debug, Error)]
pub enum BotError {
    /// Login was refused; the loop cannot continue.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// A publish was requested but no room is configured.
    #[error("no target room configured")]
    NoRoom,

    /// The image could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The image could not be published.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The cursor could not be loaded or saved.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration for [`Bot`].
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Login credentials.
    pub credentials: Credentials,
    /// Target room; `None` disables publishing and reaction dispatch.
    pub room: Option<RoomId>,
    /// Daily post time; `None` disables the scheduler.
    pub schedule: Option<TimeOfDay>,
    /// Long-poll timeout for each sync step.
    pub sync_timeout: Duration,
    /// Pause after a failed sync before retrying.
    pub retry_delay: Duration,
}

impl BotConfig {
    /// Configuration with no room, no schedule and default timings.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            room: None,
            schedule: None,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Set the target room.
    pub fn with_room(mut self, room: RoomId) -> Self {
        self.room = Some(room);
        self
    }

    /// Set the daily post time.
    pub fn with_schedule(mut self, time: TimeOfDay) -> Self {
        self.schedule = Some(time);
        self
    }

    /// Set the sync long-poll timeout.
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Set the pause after a failed sync.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// The daily-image bot.
pub struct Bot<T, S, V, C> {
    config: BotConfig,
    transport: T,
    source: S,
    votes: V,
    clock: C,
    store: CursorStore,
    state: LoopState,
    pending: VecDeque<LoopAction>,
    cursor: Cursor,
    job: Option<ScheduledJob>,
    /// Canonical ID of the target room once joined.
    room: Option<RoomId>,
    /// The post made by this process; the only one reactions count against.
    current_post: Option<PostId>,
    batch: Option<SyncBatch>,
    /// Set on session loss, cleared by the next successful sync.
    reauthenticating: bool,
}

impl<T, S, V, C> Bot<T, S, V, C>
where
    T: ChatTransport,
    S: ImageSource,
    V: VoteForwarder,
    C: Clock,
{
    /// Create a bot, loading the persisted cursor from `store`.
    pub async fn new(
        config: BotConfig,
        transport: T,
        source: S,
        votes: V,
        clock: C,
        store: CursorStore,
    ) -> Result<Self, BotError> {
        let cursor = store.load().await?;

        let job = match (config.schedule, &config.room) {
            (Some(time), Some(_)) => {
                let now = clock.now();
                let job = ScheduledJob::arm(time, cursor.last_handled_on(), now);
                if job != ScheduledJob::resume(time, cursor.last_handled_on()) {
                    tracing::info!("Started after {}, first daily post is tomorrow", time);
                }
                Some(job)
            }
            (Some(_), None) => {
                tracing::warn!("No room configured, daily post disabled");
                None
            }
            (None, _) => None,
        };

        Ok(Self {
            room: config.room.clone(),
            config,
            transport,
            source,
            votes,
            clock,
            store,
            state: LoopState::new(),
            pending: VecDeque::new(),
            cursor,
            job,
            current_post: None,
            batch: None,
            reauthenticating: false,
        })
    }

    /// Current loop state.
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// In-memory cursor.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// The post made by this process, if any.
    pub fn current_post(&self) -> Option<&PostId> {
        self.current_post.as_ref()
    }

    /// The daily job, if the scheduler is enabled.
    pub fn job(&self) -> Option<&ScheduledJob> {
        self.job.as_ref()
    }

    /// Kick off the loop from the authenticating state.
    pub fn start(&mut self) {
        self.feed(LoopEvent::Start);
    }

    /// Run until login fails for good.
    ///
    /// Only returns on a fatal error; a healthy bot loops forever.
    pub async fn run(&mut self) -> Result<(), BotError> {
        self.start();
        while self.step().await?.is_some() {}
        Ok(())
    }

    /// Run until the next cursor persist (one full loop iteration).
    pub async fn run_cycle(&mut self) -> Result<(), BotError> {
        if self.pending.is_empty() {
            self.start();
        }
        while let Some(action) = self.step().await? {
            if action == LoopAction::Persist {
                break;
            }
        }
        Ok(())
    }

    /// Execute the next pending action.
    ///
    /// Returns the action executed, or `None` if nothing is pending.
    pub async fn step(&mut self) -> Result<Option<LoopAction>, BotError> {
        let Some(action) = self.pending.pop_front() else {
            return Ok(None);
        };

        match &action {
            LoopAction::Login => self.login().await,
            LoopAction::JoinRoom => self.join_room().await,
            LoopAction::RunScheduler => self.run_scheduler().await,
            LoopAction::Sync => self.sync().await,
            LoopAction::Dispatch => self.dispatch().await,
            LoopAction::Persist => self.persist().await,
            LoopAction::Pause => tokio::time::sleep(self.config.retry_delay).await,
            LoopAction::Exit { reason } => {
                tracing::error!("Stopping: {}", reason);
                return Err(BotError::LoginFailed(reason.clone()));
            }
        }

        Ok(Some(action))
    }

    /// Log in, fetch and publish one image right now, and record it.
    pub async fn post_once(&mut self) -> Result<PostId, BotError> {
        let room = self.config.room.clone().ok_or(BotError::NoRoom)?;

        if let LoginResult::Failed(reason) = self.transport.login(&self.config.credentials).await {
            return Err(BotError::LoginFailed(reason));
        }

        let room = match self.transport.join_room(&room).await {
            Ok(joined) => joined,
            Err(e) => {
                tracing::warn!("Failed to join {}: {}", room, e);
                room
            }
        };

        let bytes = self.source.fetch().await?;
        let post = publish(&self.transport, &room, &bytes).await?;

        self.cursor.record_post(post.clone(), self.clock.now().date());
        self.store.save(&self.cursor).await?;
        self.current_post = Some(post.clone());

        Ok(post)
    }

    // =========================================================================
    // Action handlers
    // =========================================================================

    fn feed(&mut self, event: LoopEvent) {
        let (state, actions) = std::mem::take(&mut self.state).on_event(event);
        self.state = state;
        if !actions.is_empty() {
            self.pending = actions.into();
        }
    }

    fn session_lost(&mut self, error: TransportError) {
        let repeated = std::mem::replace(&mut self.reauthenticating, true);
        tracing::warn!("Session lost ({}), logging in again", error);
        self.feed(LoopEvent::SessionLost {
            reason: error.to_string(),
        });

        // The new session was rejected before it could sync once.
        if repeated && self.pending.front() == Some(&LoopAction::Login) {
            tracing::warn!(
                "New session rejected, waiting {:?} before logging in",
                self.config.retry_delay
            );
            self.pending.push_front(LoopAction::Pause);
        }
    }

    async fn login(&mut self) {
        match self.transport.login(&self.config.credentials).await {
            LoginResult::Authenticated(session) => {
                tracing::info!("Logged in as {}", session.user_id);
                self.feed(LoopEvent::LoginSucceeded);
            }
            LoginResult::Failed(reason) => {
                tracing::error!("Login failed: {}", reason);
                self.feed(LoopEvent::LoginFailed { reason });
            }
        }
    }

    async fn join_room(&mut self) {
        let Some(room) = self.config.room.clone() else {
            return;
        };

        match self.transport.join_room(&room).await {
            Ok(joined) => {
                if joined != room {
                    tracing::debug!("Resolved {} to {}", room, joined);
                }
                tracing::info!("Joined {}", joined);
                self.room = Some(joined);
            }
            Err(e) if e.is_session_lost() => self.session_lost(e),
            Err(e) => tracing::warn!("Failed to join {}: {}", room, e),
        }
    }

    async fn run_scheduler(&mut self) {
        let (Some(job), Some(room)) = (self.job, self.room.clone()) else {
            return;
        };

        let (due, next) = job.poll(self.clock.now());
        self.job = Some(next);
        if !due {
            return;
        }

        tracing::info!("Daily post due ({})", job.time_of_day());

        let previous_run = self.cursor.last_run_on;
        self.cursor.record_run(self.clock.now().date());
        if let Err(e) = self.store.save(&self.cursor).await {
            tracing::warn!("Failed to persist daily run: {}", e);
        }

        let bytes = match self.source.fetch().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping today's post: {}", e);
                return;
            }
        };

        match publish(&self.transport, &room, &bytes).await {
            Ok(post) => self.record_post(post).await,
            Err(e) if e.transport_error().is_some_and(TransportError::is_session_lost) => {
                // Retry after the new login.
                self.job = Some(job);
                self.cursor.last_run_on = previous_run;
                if let PublishError::UploadFailed(e) | PublishError::SendFailed(e) = e {
                    self.session_lost(e);
                }
            }
            Err(e) => tracing::warn!("Skipping today's post: {}", e),
        }
    }

    async fn record_post(&mut self, post: PostId) {
        self.cursor.record_post(post.clone(), self.clock.now().date());
        self.current_post = Some(post);

        if let Err(e) = self.store.save(&self.cursor).await {
            tracing::warn!("Failed to persist new post: {}", e);
        }
    }

    async fn sync(&mut self) {
        let filter_room = self.room.as_ref().filter(|room| !room.is_alias());
        let result = self
            .transport
            .sync(
                self.cursor.sync_token.as_ref(),
                self.config.sync_timeout,
                filter_room,
            )
            .await;

        match result {
            Ok(batch) => {
                tracing::debug!("Sync returned {} events", batch.event_count());
                self.reauthenticating = false;
                self.batch = Some(batch);
                self.feed(LoopEvent::SyncReturned);
            }
            Err(e) if e.is_session_lost() => self.session_lost(e),
            Err(e) => {
                tracing::warn!(
                    "Sync failed: {}, retrying in {:?}",
                    e,
                    self.config.retry_delay
                );
                self.feed(LoopEvent::SyncFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    async fn dispatch(&mut self) {
        if let (Some(batch), Some(room)) = (&self.batch, &self.room) {
            let votes = classify_batch(batch.events_for(room), self.current_post.as_ref());
            for vote in &votes {
                tracing::info!("Reaction vote: {}", vote.category);
                self.votes.forward(vote).await;
            }
        }

        self.feed(LoopEvent::DispatchFinished);
    }

    async fn persist(&mut self) {
        if let Some(token) = self.batch.take().and_then(|batch| batch.next_token) {
            self.cursor.advance(token);
        }

        if let Err(e) = self.store.save(&self.cursor).await {
            tracing::warn!("Failed to persist cursor: {}", e);
        }

        self.feed(LoopEvent::PersistFinished);
    }
}
