//! Image source: where the daily picture comes from.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors fetching the daily image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The image service answered with something other than 200.
    #[error("image service returned status {0}")]
    Status(u16),

    /// Request could not be completed.
    #[error("image fetch failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e.to_string())
    }
}

/// Something that can produce today's image bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetch the raw image bytes.
    async fn fetch(&self) -> Result<Vec<u8>, FetchError>;
}

/// Fetches the image with a plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    url: String,
    http: reqwest::Client,
}

impl HttpImageSource {
    /// Create a source for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// The URL fetched.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(&self.url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        tracing::debug!("Fetched {} bytes from {}", bytes.len(), self.url);
        Ok(bytes.to_vec())
    }
}

/// Scripted image source for tests.
///
/// Responses are served in order; once the queue is empty the fallback
/// response (if any) is repeated.
#[derive(Clone, Default)]
pub struct MockImageSource {
    inner: Arc<Mutex<MockImageSourceInner>>,
}

#[derive(Default)]
struct MockImageSourceInner {
    queue: VecDeque<Result<Vec<u8>, u16>>,
    fallback: Option<Result<Vec<u8>, u16>>,
    fetches: usize,
}

impl MockImageSource {
    /// Create a source with nothing to serve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always serve these bytes.
    pub fn serving(bytes: Vec<u8>) -> Self {
        let source = Self::new();
        source.inner.lock().unwrap().fallback = Some(Ok(bytes));
        source
    }

    /// Serve `bytes` on the next fetch.
    pub fn queue_bytes(&self, bytes: Vec<u8>) {
        self.inner.lock().unwrap().queue.push_back(Ok(bytes));
    }

    /// Answer the next fetch with an HTTP status error.
    pub fn queue_status(&self, status: u16) {
        self.inner.lock().unwrap().queue.push_back(Err(status));
    }

    /// Number of fetches performed.
    pub fn fetch_count(&self) -> usize {
        self.inner.lock().unwrap().fetches
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetches += 1;

        let next = match inner.queue.pop_front() {
            Some(next) => next,
            None => match inner.fallback.clone() {
                Some(fallback) => fallback,
                None => return Err(FetchError::Http("no response queued".into())),
            },
        };

        next.map_err(FetchError::Status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_serves_queue_then_fallback() {
        let source = MockImageSource::serving(vec![9]);
        source.queue_bytes(vec![1, 2]);
        source.queue_status(500);

        assert_eq!(source.fetch().await.unwrap(), vec![1, 2]);
        assert!(matches!(source.fetch().await, Err(FetchError::Status(500))));
        assert_eq!(source.fetch().await.unwrap(), vec![9]);
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn empty_mock_fails() {
        let source = MockImageSource::new();
        assert!(matches!(source.fetch().await, Err(FetchError::Http(_))));
    }

    #[test]
    fn http_source_keeps_url() {
        let source = HttpImageSource::new("https://capybara.lol/today");
        assert_eq!(source.url(), "https://capybara.lol/today");
    }
}
