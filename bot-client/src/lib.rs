//! # capybot-client
//!
//! The I/O side of capybot.
//!
//! This crate performs everything capybot-core deliberately avoids:
//! talking to the homeserver, fetching the daily image, forwarding votes,
//! reading the clock and persisting the cursor.
//!
//! ## Features
//!
//! - **Transport Abstraction**: Pluggable homeserver transport (Matrix over HTTP, mock)
//! - **Image Publisher**: Sniff, measure, upload and post an image in one call
//! - **Atomic Cursor Store**: One JSON record, replaced by rename
//! - **Pure State Machine**: Uses capybot-core for side-effect-free loop logic
//!
//! ## Example
//!
//! ```ignore
//! use capybot_client::{Bot, BotConfig, Credentials, CursorStore, HttpImageSource,
//!     HttpVoteForwarder, MatrixTransport, SystemClock};
//!
//! let transport = MatrixTransport::new("https://matrix.org")?;
//! let config = BotConfig::new(Credentials::new("capybot", "secret")).with_room(room);
//! let mut bot = Bot::new(
//!     config,
//!     transport,
//!     HttpImageSource::new("https://capybara.lol/today"),
//!     HttpVoteForwarder::new(None, None),
//!     SystemClock,
//!     CursorStore::new("state.json"),
//! )
//! .await?;
//!
//! bot.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bot;
pub mod clock;
pub mod publisher;
pub mod source;
pub mod store;
pub mod transport;
pub mod votes;

pub use bot::{Bot, BotConfig, BotError, DEFAULT_RETRY_DELAY, DEFAULT_SYNC_TIMEOUT};
pub use clock::{Clock, FixedClock, SystemClock};
pub use publisher::{publish, PublishError, IMAGE_STEM};
pub use source::{FetchError, HttpImageSource, ImageSource, MockImageSource};
pub use store::{CursorStore, StoreError};
pub use transport::{
    ChatTransport, Credentials, LoginResult, MatrixTransport, MockTransport, Session, SyncBatch,
    TransportError,
};
pub use votes::{HttpVoteForwarder, MockVoteForwarder, VoteForwarder};
