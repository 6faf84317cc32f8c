//! Inbound room timeline events.
//!
//! The homeserver delivers timeline events as free-form JSON records with a
//! `type` tag and a `content` map. Only reactions matter to capybot, so an
//! event is reduced to the handful of fields the classifier reads; every
//! other event survives as [`EventKind::Other`] so that dispatch still sees
//! the batch in arrival order.

use serde_json::Value;

use crate::ids::PostId;

/// Event type tag of a reaction.
pub const REACTION_EVENT_TYPE: &str = "m.reaction";

/// Content key holding the relation of a reaction to its target.
pub const RELATES_TO_KEY: &str = "m.relates_to";

/// Broad kind of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An emoji annotation on a prior message.
    Reaction,
    /// Anything else (messages, state events, redactions...).
    Other,
}

/// One timeline event from a sync batch.
///
/// Ephemeral: built per batch and dropped after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Server-assigned ID of the event itself, if present.
    pub event_id: Option<String>,
    /// Sender of the event, if present.
    pub sender: Option<String>,
    /// Reaction or other.
    pub kind: EventKind,
    /// Target of the relates-to reference.
    pub related_post_id: Option<PostId>,
    /// The reaction key (usually one emoji).
    pub vote_key: Option<String>,
}

impl InboundEvent {
    /// Build a reaction event (mostly useful for tests and mocks).
    pub fn reaction(related_post_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            event_id: None,
            sender: None,
            kind: EventKind::Reaction,
            related_post_id: Some(PostId::new(related_post_id)),
            vote_key: Some(key.into()),
        }
    }

    /// Build a non-reaction event.
    pub fn other() -> Self {
        Self {
            event_id: None,
            sender: None,
            kind: EventKind::Other,
            related_post_id: None,
            vote_key: None,
        }
    }

    /// Reduce a raw timeline event to an `InboundEvent`.
    ///
    /// Never fails: malformed or unknown records become [`EventKind::Other`]
    /// with whatever identifying fields could be read.
    pub fn from_json(raw: &Value) -> Self {
        let event_id = raw
            .get("event_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let sender = raw
            .get("sender")
            .and_then(Value::as_str)
            .map(str::to_string);

        let is_reaction = raw.get("type").and_then(Value::as_str) == Some(REACTION_EVENT_TYPE);
        if !is_reaction {
            return Self {
                event_id,
                sender,
                ..Self::other()
            };
        }

        let relation = raw
            .get("content")
            .and_then(|content| content.get(RELATES_TO_KEY));
        let related_post_id = relation
            .and_then(|rel| rel.get("event_id"))
            .and_then(Value::as_str)
            .map(PostId::new);
        let vote_key = relation
            .and_then(|rel| rel.get("key"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            event_id,
            sender,
            kind: EventKind::Reaction,
            related_post_id,
            vote_key,
        }
    }

    /// Whether this is a reaction.
    pub fn is_reaction(&self) -> bool {
        self.kind == EventKind::Reaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_reaction() {
        let raw = json!({
            "type": "m.reaction",
            "event_id": "$r1",
            "sender": "@alice:example.org",
            "content": {
                "m.relates_to": {
                    "rel_type": "m.annotation",
                    "event_id": "$abc",
                    "key": "😂"
                }
            }
        });

        let event = InboundEvent::from_json(&raw);
        assert_eq!(event.kind, EventKind::Reaction);
        assert_eq!(event.event_id.as_deref(), Some("$r1"));
        assert_eq!(event.sender.as_deref(), Some("@alice:example.org"));
        assert_eq!(event.related_post_id, Some(PostId::new("$abc")));
        assert_eq!(event.vote_key.as_deref(), Some("😂"));
    }

    #[test]
    fn message_is_other() {
        let raw = json!({
            "type": "m.room.message",
            "event_id": "$m1",
            "content": { "msgtype": "m.text", "body": "hi" }
        });

        let event = InboundEvent::from_json(&raw);
        assert_eq!(event.kind, EventKind::Other);
        assert_eq!(event.event_id.as_deref(), Some("$m1"));
        assert!(event.related_post_id.is_none());
        assert!(event.vote_key.is_none());
    }

    #[test]
    fn reaction_without_relation_has_no_target() {
        let raw = json!({ "type": "m.reaction", "content": {} });

        let event = InboundEvent::from_json(&raw);
        assert!(event.is_reaction());
        assert!(event.related_post_id.is_none());
        assert!(event.vote_key.is_none());
    }

    #[test]
    fn garbage_is_other() {
        let event = InboundEvent::from_json(&json!("not an object"));
        assert_eq!(event, InboundEvent::other());

        let event = InboundEvent::from_json(&json!({ "type": 7 }));
        assert_eq!(event.kind, EventKind::Other);
    }

    #[test]
    fn non_string_fields_are_ignored() {
        let raw = json!({
            "type": "m.reaction",
            "content": { "m.relates_to": { "event_id": 42, "key": ["😂"] } }
        });

        let event = InboundEvent::from_json(&raw);
        assert!(event.is_reaction());
        assert!(event.related_post_id.is_none());
        assert!(event.vote_key.is_none());
    }
}
