//! Vote forwarding to the external scoring service.
//!
//! Forwarding is best-effort: failures are logged and dropped, never
//! retried, and never interrupt the loop.

use async_trait::async_trait;
use bot_types::{Vote, VoteCategory};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const VOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for classified votes.
#[async_trait]
pub trait VoteForwarder: Send + Sync {
    /// Forward one vote. Never fails from the caller's point of view.
    async fn forward(&self, vote: &Vote);
}

/// Forwards votes as empty unauthenticated POSTs, one URL per category.
///
/// A category without a URL is silently ignored.
#[derive(Debug, Clone)]
pub struct HttpVoteForwarder {
    funny_url: Option<String>,
    cute_url: Option<String>,
    http: reqwest::Client,
}

impl HttpVoteForwarder {
    /// Create a forwarder. Empty URLs disable their category.
    pub fn new(funny_url: Option<String>, cute_url: Option<String>) -> Self {
        let non_empty = |url: Option<String>| url.filter(|u| !u.trim().is_empty());
        Self {
            funny_url: non_empty(funny_url),
            cute_url: non_empty(cute_url),
            http: reqwest::Client::new(),
        }
    }

    /// Endpoint for a category, if configured.
    pub fn url_for(&self, category: VoteCategory) -> Option<&str> {
        match category {
            VoteCategory::Funny => self.funny_url.as_deref(),
            VoteCategory::Cute => self.cute_url.as_deref(),
        }
    }
}

#[async_trait]
impl VoteForwarder for HttpVoteForwarder {
    async fn forward(&self, vote: &Vote) {
        let Some(url) = self.url_for(vote.category) else {
            tracing::debug!("No endpoint for {} votes, dropping", vote.category);
            return;
        };

        match self.http.post(url).timeout(VOTE_TIMEOUT).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Forwarded {} vote", vote.category);
            }
            Ok(response) => {
                tracing::warn!(
                    "Vote endpoint {} answered {}, dropping {} vote",
                    url,
                    response.status(),
                    vote.category
                );
            }
            Err(e) => {
                tracing::warn!("Failed to forward {} vote: {}", vote.category, e);
            }
        }
    }
}

/// Records forwarded votes for tests.
#[derive(Debug, Clone, Default)]
pub struct MockVoteForwarder {
    votes: Arc<Mutex<Vec<Vote>>>,
}

impl MockVoteForwarder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Votes forwarded so far, in order.
    pub fn votes(&self) -> Vec<Vote> {
        self.votes.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoteForwarder for MockVoteForwarder {
    async fn forward(&self, vote: &Vote) {
        self.votes.lock().unwrap().push(vote.clone());
    }
}
