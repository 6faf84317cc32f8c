//! Vote categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reaction key that counts as a "funny" vote.
pub const FUNNY_KEY: &str = "😂";

/// Reaction key that counts as a "cute" vote.
pub const CUTE_KEY: &str = "🥰";

/// What a reaction says about the picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteCategory {
    /// Laughing reaction.
    Funny,
    /// Adoring reaction.
    Cute,
}

impl VoteCategory {
    /// Map a reaction key through the fixed two-entry table.
    ///
    /// Exact match only: variation selectors or skin tones produce `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            FUNNY_KEY => Some(Self::Funny),
            CUTE_KEY => Some(Self::Cute),
            _ => None,
        }
    }

    /// Lowercase name used in URLs and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Funny => "funny",
            Self::Cute => "cute",
        }
    }

    /// The reaction key for this category.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Funny => FUNNY_KEY,
            Self::Cute => CUTE_KEY,
        }
    }
}

impl fmt::Display for VoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified vote, sent once and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vote {
    /// The category the reaction expressed.
    pub category: VoteCategory,
}

impl Vote {
    /// Create a vote for a category.
    pub fn new(category: VoteCategory) -> Self {
        Self { category }
    }
}
