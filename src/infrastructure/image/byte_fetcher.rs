//! Network and file byte fetcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::domain::entities::{Locator, LocatorScheme};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::ByteFetcherPort;
use crate::infrastructure::config::FetchConfig;

/// Fetches bytes over HTTP(S) or from the local filesystem.
///
/// Concurrent transfers are bounded by a semaphore; a fetch waiting for a
/// permit is cancelled like any other when its task is aborted.
pub struct HttpByteFetcher {
    http_client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    config: FetchConfig,
}

impl std::fmt::Debug for HttpByteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpByteFetcher")
            .field("config", &self.config)
            .field("available_permits", &self.semaphore.available_permits())
            .finish_non_exhaustive()
    }
}

impl HttpByteFetcher {
    /// Creates a fetcher with the given configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: FetchConfig) -> LoadResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| LoadError::transport(format!("Failed to create HTTP client: {e}")))?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));

        Ok(Self {
            http_client,
            semaphore,
            config,
        })
    }

    /// Creates a fetcher with default configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_defaults() -> LoadResult<Self> {
        Self::new(FetchConfig::default())
    }

    /// Number of transfers that may start without waiting.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn download(&self, url: &str) -> LoadResult<Bytes> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::transport(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LoadError::transport(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| LoadError::transport(format!("Failed to read body: {e}")))
    }
}

#[async_trait]
impl ByteFetcherPort for HttpByteFetcher {
    async fn fetch(&self, locator: &Locator) -> LoadResult<Bytes> {
        let scheme = locator.scheme()?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| LoadError::transport(format!("Fetcher closed: {e}")))?;

        match scheme {
            LocatorScheme::Remote(url) => {
                debug!(url = %url, "Downloading image from network");
                self.download(&url).await
            }
            LocatorScheme::File(path) => {
                trace!(path = %path.display(), "Reading image from disk");
                tokio::fs::read(&path).await.map(Bytes::from).map_err(|e| {
                    LoadError::transport(format!("Failed to read {}: {e}", path.display()))
                })
            }
        }
    }
}
