//! Port definition for the thumbnail store.

use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::oneshot;

use crate::domain::entities::{ImageId, Locator};
use crate::domain::errors::{LoadError, LoadResult};

/// Outcome delivered to thumbnail waiters.
pub type ThumbnailResult = LoadResult<Arc<DynamicImage>>;

/// Answer to a thumbnail lookup.
#[derive(Debug)]
pub enum ThumbnailLookup {
    /// The thumbnail was already cached.
    Cached(Arc<DynamicImage>),
    /// A production is in flight; the receiver completes exactly once.
    Pending(oneshot::Receiver<ThumbnailResult>),
}

impl ThumbnailLookup {
    /// Returns true if the thumbnail was cached at lookup time.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    /// Waits for the thumbnail.
    ///
    /// # Errors
    /// Returns the production failure, or `CacheProductionFailed` if the
    /// production was abandoned without an answer.
    pub async fn wait(self) -> ThumbnailResult {
        match self {
            Self::Cached(img) => Ok(img),
            Self::Pending(rx) => rx.await.unwrap_or_else(|_| {
                Err(LoadError::production_failed(LoadError::transport(
                    "thumbnail production abandoned",
                )))
            }),
        }
    }
}

/// Format-keyed, identity-keyed store of small pre-rendered bitmaps.
/// Implementations must be thread-safe and must not block.
pub trait ThumbnailStorePort: Send + Sync {
    /// Point-in-time check for a cached thumbnail.
    fn exists(&self, id: &ImageId, format: &str) -> bool;

    /// Returns the cached thumbnail or starts (or joins) its production.
    ///
    /// # Errors
    /// Returns `LoadError::UnknownFormat` if the format is not registered.
    fn get(&self, id: &ImageId, locator: &Locator, format: &str) -> LoadResult<ThumbnailLookup>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;

    use parking_lot::Mutex;

    /// Thumbnail store whose productions are completed by the test.
    #[derive(Default)]
    pub struct MockThumbnailStore {
        cached: Mutex<HashMap<(ImageId, String), Arc<DynamicImage>>>,
        waiters: Mutex<HashMap<ImageId, Vec<(String, oneshot::Sender<ThumbnailResult>)>>>,
        requests: Mutex<Vec<ImageId>>,
    }

    impl MockThumbnailStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds a cached thumbnail.
        pub fn insert(&self, id: &ImageId, format: &str, image: Arc<DynamicImage>) {
            self.cached
                .lock()
                .insert((id.clone(), format.to_string()), image);
        }

        /// Completes every pending request for `id`. Returns the waiter count.
        pub fn complete(&self, id: &ImageId, result: ThumbnailResult) -> usize {
            let waiters = self.waiters.lock().remove(id).unwrap_or_default();
            let count = waiters.len();
            for (format, tx) in waiters {
                if let Ok(img) = &result {
                    self.insert(id, &format, img.clone());
                }
                let _ = tx.send(result.clone());
            }
            count
        }

        /// Number of `get` calls that started a pending request for `id`.
        pub fn request_count(&self, id: &ImageId) -> usize {
            self.requests.lock().iter().filter(|r| *r == id).count()
        }
    }

    impl ThumbnailStorePort for MockThumbnailStore {
        fn exists(&self, id: &ImageId, format: &str) -> bool {
            self.cached
                .lock()
                .contains_key(&(id.clone(), format.to_string()))
        }

        fn get(
            &self,
            id: &ImageId,
            _locator: &Locator,
            format: &str,
        ) -> LoadResult<ThumbnailLookup> {
            if let Some(img) = self.cached.lock().get(&(id.clone(), format.to_string())) {
                return Ok(ThumbnailLookup::Cached(img.clone()));
            }
            let (tx, rx) = oneshot::channel();
            self.waiters
                .lock()
                .entry(id.clone())
                .or_default()
                .push((format.to_string(), tx));
            self.requests.lock().push(id.clone());
            Ok(ThumbnailLookup::Pending(rx))
        }
    }
}
