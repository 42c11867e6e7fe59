//! Thumbnail cache with coalesced production.
//!
//! Concurrent requests for the same `(identity, format)` share one
//! production. The cache lookup and waiter registration happen under a
//! single lock, so a request can never miss a production that completes
//! between the two.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::DynamicImage;
use image::imageops::FilterType;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::domain::entities::{ImageId, Locator, ThumbnailFormat};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{ByteFetcherPort, ThumbnailLookup, ThumbnailResult, ThumbnailStorePort};
use crate::infrastructure::image::source_loader::fetch_source_image;
use crate::infrastructure::image::thumbnail_store::{CacheStats, ThumbnailStore};

type PendingKey = (ImageId, String);

struct CacheState {
    store: ThumbnailStore,
    pending: HashMap<PendingKey, Vec<oneshot::Sender<ThumbnailResult>>>,
}

struct CacheInner {
    fetcher: Arc<dyn ByteFetcherPort>,
    formats: HashMap<String, ThumbnailFormat>,
    state: Mutex<CacheState>,
    productions: AtomicU64,
}

/// In-memory thumbnail cache producing missing entries from source bytes.
///
/// Cloning shares the underlying cache.
#[derive(Clone)]
pub struct ThumbnailCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("formats", &self.inner.formats.keys().collect::<Vec<_>>())
            .field("productions", &self.productions())
            .finish_non_exhaustive()
    }
}

impl ThumbnailCache {
    /// Creates a cache for the given formats.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ByteFetcherPort>, formats: Vec<ThumbnailFormat>) -> Self {
        let store = ThumbnailStore::new(&formats);
        let formats = formats.into_iter().map(|f| (f.name.clone(), f)).collect();

        Self {
            inner: Arc::new(CacheInner {
                fetcher,
                formats,
                state: Mutex::new(CacheState {
                    store,
                    pending: HashMap::new(),
                }),
                productions: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a cache with the default square format.
    #[must_use]
    pub fn with_default_format(fetcher: Arc<dyn ByteFetcherPort>) -> Self {
        Self::new(fetcher, vec![ThumbnailFormat::default()])
    }

    /// Looks up a registered format.
    #[must_use]
    pub fn format(&self, name: &str) -> Option<&ThumbnailFormat> {
        self.inner.formats.get(name)
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.state.lock().store.stats()
    }

    /// Number of productions started since creation.
    #[must_use]
    pub fn productions(&self) -> u64 {
        self.inner.productions.load(Ordering::Relaxed)
    }

    /// Number of productions currently awaiting completion.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Removes every thumbnail of `id`.
    pub fn evict(&self, id: &ImageId) -> usize {
        self.inner.state.lock().store.evict(id)
    }

    /// Removes every thumbnail.
    pub fn clear(&self) {
        self.inner.state.lock().store.clear();
    }
}

impl ThumbnailStorePort for ThumbnailCache {
    fn exists(&self, id: &ImageId, format: &str) -> bool {
        let Some(format) = self.inner.formats.get(format) else {
            return false;
        };
        self.inner.state.lock().store.contains(format, id)
    }

    fn get(&self, id: &ImageId, locator: &Locator, format: &str) -> LoadResult<ThumbnailLookup> {
        let format = self
            .inner
            .formats
            .get(format)
            .ok_or_else(|| LoadError::unknown_format(format))?;

        let mut state = self.inner.state.lock();
        if let Some(img) = state.store.get(format, id) {
            return Ok(ThumbnailLookup::Cached(img));
        }

        let (tx, rx) = oneshot::channel();
        match state.pending.entry((id.clone(), format.name.clone())) {
            Entry::Occupied(mut waiters) => {
                trace!(id = %id, format = %format.name, "Joining pending thumbnail production");
                waiters.get_mut().push(tx);
            }
            Entry::Vacant(slot) => {
                let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
                    LoadError::production_failed(LoadError::transport(format!(
                        "No runtime for thumbnail production: {e}"
                    )))
                })?;
                slot.insert(vec![tx]);
                self.inner.productions.fetch_add(1, Ordering::Relaxed);
                debug!(id = %id, format = %format.name, "Starting thumbnail production");
                runtime.spawn(produce(
                    self.inner.clone(),
                    id.clone(),
                    locator.clone(),
                    format.clone(),
                ));
            }
        }

        Ok(ThumbnailLookup::Pending(rx))
    }
}

async fn produce(inner: Arc<CacheInner>, id: ImageId, locator: Locator, format: ThumbnailFormat) {
    let result = render(inner.fetcher.as_ref(), &locator, &format)
        .await
        .map_err(LoadError::production_failed);

    let waiters = {
        let mut state = inner.state.lock();
        if let Ok(img) = &result {
            state.store.put(&format, id.clone(), img.clone());
        }
        state
            .pending
            .remove(&(id.clone(), format.name.clone()))
            .unwrap_or_default()
    };

    if let Err(e) = &result {
        warn!(id = %id, format = %format.name, error = %e, "Thumbnail production failed");
    }
    trace!(id = %id, waiters = waiters.len(), "Delivering thumbnail");
    for tx in waiters {
        let _ = tx.send(result.clone());
    }
}

async fn render(
    fetcher: &dyn ByteFetcherPort,
    locator: &Locator,
    format: &ThumbnailFormat,
) -> LoadResult<Arc<DynamicImage>> {
    let source = fetch_source_image(fetcher, locator).await?;
    let (width, height) = (format.width, format.height);

    let thumbnail = tokio::task::spawn_blocking(move || {
        let cropped = crop_to_aspect(&source, width, height);
        let resized = cropped.resize_exact(width, height, FilterType::Lanczos3);
        DynamicImage::ImageRgba8(resized.to_rgba8())
    })
    .await
    .map_err(|e| LoadError::decode(format!("Thumbnail task panicked: {e}")))?;

    Ok(Arc::new(thumbnail))
}

/// Center-crops `img` to the aspect ratio of `width`x`height`.
#[must_use]
pub fn crop_to_aspect(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = (u64::from(img.width()), u64::from(img.height()));
    let (dst_w, dst_h) = (u64::from(width.max(1)), u64::from(height.max(1)));

    let (crop_w, crop_h) = if src_w * dst_h > src_h * dst_w {
        ((src_h * dst_w / dst_h).max(1), src_h)
    } else {
        (src_w, (src_w * dst_h / dst_w).max(1))
    };

    let x = (src_w - crop_w) / 2;
    let y = (src_h - crop_h) / 2;

    #[allow(clippy::cast_possible_truncation)]
    img.crop_imm(x as u32, y as u32, crop_w as u32, crop_h as u32)
}
