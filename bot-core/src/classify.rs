//! Reaction classifier.
//!
//! Decides whether an inbound event is a vote on the most recent post.

use bot_types::{InboundEvent, PostId, Vote, VoteCategory};

/// Classify an event against the most recent post.
///
/// Pure: the result depends only on `(event, last_post_id)`, so replaying a
/// batch yields the same votes. A vote requires all of:
/// - the event is a reaction,
/// - its relates-to target equals `last_post_id` exactly (older posts are
///   never eligible),
/// - its key is in the fixed two-entry table.
///
/// With no post in this process lifetime (`None`) nothing is a vote.
pub fn classify(event: &InboundEvent, last_post_id: Option<&PostId>) -> Option<Vote> {
    let last_post_id = last_post_id?;

    if !event.is_reaction() {
        return None;
    }

    if event.related_post_id.as_ref() != Some(last_post_id) {
        return None;
    }

    let key = event.vote_key.as_deref()?;
    VoteCategory::from_key(key).map(Vote::new)
}

/// Classify a whole batch in arrival order.
///
/// Every event is looked at; non-matching events are skipped without
/// affecting later ones.
pub fn classify_batch<'a>(
    events: impl IntoIterator<Item = &'a InboundEvent>,
    last_post_id: Option<&'a PostId>,
) -> Vec<Vote> {
    events
        .into_iter()
        .filter_map(|event| classify(event, last_post_id))
        .collect()
}
