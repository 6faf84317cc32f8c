//! # capybot-types
//!
//! Shared types for capybot, the daily capybara bot.
//!
//! This crate provides the foundational types used across all capybot crates:
//! - [`RoomId`], [`PostId`], [`SyncToken`], [`ContentUri`], [`UserId`] - opaque server identifiers
//! - [`Cursor`] - the record persisted across restarts
//! - [`InboundEvent`] - a timeline event reduced to what reaction matching needs
//! - [`ImageMessage`] - content of the daily post
//! - [`Vote`], [`VoteCategory`] - what a reaction expresses

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cursor;
mod error;
mod event;
mod ids;
mod messages;
mod vote;

pub use cursor::Cursor;
pub use error::IdError;
pub use event::{EventKind, InboundEvent, REACTION_EVENT_TYPE, RELATES_TO_KEY};
pub use ids::{ContentUri, PostId, RoomId, SyncToken, UserId};
pub use messages::{ImageInfo, ImageMessage, IMAGE_MSGTYPE, ROOM_MESSAGE_EVENT_TYPE};
pub use vote::{Vote, VoteCategory, CUTE_KEY, FUNNY_KEY};
