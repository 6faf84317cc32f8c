//! # capybot-core
//!
//! Pure logic for capybot (no I/O, instant tests).
//!
//! This crate implements the state machines and decisions of the bot
//! without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`schedule`] answers "does the daily job fire now?" from `(now, job)`
//! - [`classify`] answers "is this event a vote on the last post?" from `(event, last_post_id)`
//! - [`media`] classifies and measures image bytes in memory
//! - [`state`] sequences the sync/dispatch loop as events in, actions out
//!
//! The actual I/O (network, disk, clock) is performed by `capybot-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod media;
pub mod schedule;
pub mod state;

pub use classify::{classify, classify_batch};
pub use media::{inspect, sniff, MediaError, MediaInfo};
pub use schedule::{JobState, ScheduleError, ScheduledJob, TimeOfDay};
pub use state::{LoopAction, LoopEvent, LoopState};
