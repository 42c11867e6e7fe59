//! Port definition for raw byte acquisition.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::Locator;
use crate::domain::errors::LoadResult;

/// Fetches the raw bytes behind a locator.
///
/// Cancellation is cooperative: dropping the returned future must abort the
/// transfer and release its resources.
#[async_trait]
pub trait ByteFetcherPort: Send + Sync {
    /// Fetches the bytes for a network or file locator.
    async fn fetch(&self, locator: &Locator) -> LoadResult<Bytes>;
}
