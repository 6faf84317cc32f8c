//! Identifier types for capybot.
//!
//! All identifiers are issued by the homeserver and treated as opaque
//! strings. The newtypes only exist so that a room ID cannot be passed where
//! a post ID is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IdError;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the raw string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Identifier of a single published message (Matrix event ID, `$...`).
    ///
    /// Reactions are correlated to posts by exact string equality on this value.
    PostId
);

opaque_id!(
    /// Opaque sync position issued by the homeserver (`next_batch`).
    SyncToken
);

opaque_id!(
    /// Media repository URI returned by an upload (`mxc://...`).
    ContentUri
);

opaque_id!(
    /// Fully qualified user ID (`@user:server`).
    UserId
);

opaque_id!(
    /// Room ID (`!opaque:server`) or room alias (`#alias:server`).
    RoomId
);

impl PostId {
    /// Wrap a server-assigned event ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl SyncToken {
    /// Wrap a server-issued sync token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl ContentUri {
    /// Wrap a media URI returned by the homeserver.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }
}

impl UserId {
    /// Wrap a user ID returned by the homeserver.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl RoomId {
    /// Wrap a room ID returned by the homeserver (no validation).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a room ID or alias supplied by configuration.
    ///
    /// Accepts `!id:server` and `#alias:server`; anything else is rejected so
    /// a typo in the environment disables the room features instead of
    /// producing confusing homeserver errors later.
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let raw = raw.trim();
        let sigil_ok = raw.starts_with('!') || raw.starts_with('#');
        let has_server = raw
            .split_once(':')
            .map(|(local, server)| local.len() > 1 && !server.is_empty())
            .unwrap_or(false);

        if sigil_ok && has_server {
            Ok(Self(raw.to_string()))
        } else {
            Err(IdError::InvalidRoom(raw.to_string()))
        }
    }

    /// Whether this is an alias rather than a canonical room ID.
    pub fn is_alias(&self) -> bool {
        self.0.starts_with('#')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_accepts_id_and_alias() {
        assert!(RoomId::parse("!abc:example.org").is_ok());
        let alias = RoomId::parse("#capybaras:example.org").unwrap();
        assert!(alias.is_alias());
    }

    #[test]
    fn room_id_rejects_garbage() {
        assert!(RoomId::parse("capybaras").is_err());
        assert!(RoomId::parse("!:example.org").is_err());
        assert!(RoomId::parse("!abc:").is_err());
        assert!(RoomId::parse("").is_err());
    }

    #[test]
    fn room_id_trims_whitespace() {
        let room = RoomId::parse("  !abc:example.org\n").unwrap();
        assert_eq!(room.as_str(), "!abc:example.org");
    }

    #[test]
    fn post_id_serializes_transparently() {
        let id = PostId::new("$abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"$abc\"");
        let back: PostId = serde_json::from_str("\"$abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn debug_includes_type_name() {
        let token = SyncToken::new("s72594_4483_1934");
        assert_eq!(format!("{:?}", token), "SyncToken(s72594_4483_1934)");
        assert_eq!(token.to_string(), "s72594_4483_1934");
    }
}
