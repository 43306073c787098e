//! Snapshot Fetcher
//!
//! Retrieves the raw alert list from the feed. The poll loop only sees the
//! [`SnapshotFetcher`] trait so tests can substitute a scripted fetcher.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::FeedError;

/// Default live alerts endpoint
pub const DEFAULT_ALERTS_URL: &str = "https://www.oref.org.il/warningMessages/alert/Alerts.json";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// The feed rejects requests that do not look like they come from its own web page
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const FEED_REFERER: &str = "https://www.oref.org.il/";

/// Source of raw feed snapshots
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch the current raw payload
    async fn fetch(&self) -> Result<Vec<u8>, FeedError>;
}

/// HTTP fetcher configuration
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Feed URL
    pub url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ALERTS_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Fetches snapshots over HTTP GET
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: FetcherConfig) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(FEED_REFERER));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FeedError::InvalidConfig(e.to_string()))?;

        info!(
            "Alert feed fetcher created for {} (timeout {}s)",
            config.url,
            config.timeout.as_secs()
        );

        Ok(Self { client, config })
    }

    /// Feed URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn classify(&self, err: reqwest::Error) -> FeedError {
        if err.is_timeout() {
            FeedError::Timeout(self.config.timeout.as_millis() as u64)
        } else if let Some(status) = err.status() {
            FeedError::Status(status.as_u16())
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl SnapshotFetcher for HttpFetcher {
    async fn fetch(&self) -> Result<Vec<u8>, FeedError> {
        debug!("Fetching alerts from {}", self.config.url);

        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        debug!("Received {} bytes from alert feed", body.len());
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetcherConfig::default();
        assert_eq!(config.url, DEFAULT_ALERTS_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_fetcher_creation() {
        let fetcher = HttpFetcher::new(FetcherConfig {
            url: "http://127.0.0.1:9/alerts.json".to_string(),
            timeout: Duration::from_millis(200),
        })
        .unwrap();
        assert_eq!(fetcher.url(), "http://127.0.0.1:9/alerts.json");
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_transport_error() {
        let fetcher = HttpFetcher::new(FetcherConfig {
            url: "http://127.0.0.1:9/alerts.json".to_string(),
            timeout: Duration::from_millis(500),
        })
        .unwrap();

        let result = fetcher.fetch().await;
        assert!(matches!(
            result,
            Err(FeedError::Transport(_)) | Err(FeedError::Timeout(_))
        ));
    }
}
