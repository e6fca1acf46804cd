//! Audio payload fetching
//!
//! Background cache population and prefetch go through an [`AudioFetcher`].
//! No timeouts or retries are applied at this layer.

use crate::cache::AudioBytes;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

const USER_AGENT: &str = concat!("stemsync/", env!("CARGO_PKG_VERSION"));

/// Retrieves the raw bytes behind a stem URL
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<AudioBytes>;
}

/// HTTP fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl AudioFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<AudioBytes> {
        debug!(url = %url, "Fetching audio payload");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                message: format!("HTTP status {}", status.as_u16()),
            });
        }

        let bytes = response.bytes().await?;
        Ok(AudioBytes::from(bytes.as_ref()))
    }
}

/// In-memory fetcher serving preloaded payloads
///
/// Records every requested URL in call order.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    payloads: RwLock<HashMap<String, AudioBytes>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<AudioBytes>) {
        self.payloads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), bytes.into());
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl AudioFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<AudioBytes> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        self.payloads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .map(Arc::clone)
            .ok_or_else(|| Error::Fetch {
                url: url.to_string(),
                message: "not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_fetcher_serves_and_records() {
        let fetcher = StaticFetcher::new();
        fetcher.insert("https://cdn/a.wav", vec![1u8, 2, 3]);

        let bytes = fetcher.fetch("https://cdn/a.wav").await.unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3]);

        let missing = fetcher.fetch("https://cdn/b.wav").await;
        assert!(matches!(missing, Err(Error::Fetch { .. })));

        assert_eq!(fetcher.requests(), vec!["https://cdn/a.wav", "https://cdn/b.wav"]);
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new().is_ok());
    }
}
