//! Error types for capybot-types.

use thiserror::Error;

/// Errors raised while validating identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// Not a room ID (`!id:server`) or alias (`#alias:server`).
    #[error("invalid room id or alias: {0:?}")]
    InvalidRoom(String),
}
