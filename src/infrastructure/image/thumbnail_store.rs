//! Per-family LRU storage for produced thumbnails.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use image::DynamicImage;
use lru::LruCache;
use tracing::{debug, trace};

use crate::domain::entities::{ImageId, ThumbnailFormat};

type ThumbnailKey = (ImageId, String);

/// LRU storage for thumbnails, one LRU per format family.
///
/// A family's capacity is the sum of the `max_count` of its formats.
/// Not synchronized; the owning cache guards it with its own lock.
pub struct ThumbnailStore {
    families: HashMap<String, LruCache<ThumbnailKey, Arc<DynamicImage>>>,
    hits: u64,
    misses: u64,
}

impl ThumbnailStore {
    /// Creates a store sized for the given formats.
    #[must_use]
    pub fn new<'a>(formats: impl IntoIterator<Item = &'a ThumbnailFormat>) -> Self {
        let mut capacities: HashMap<String, usize> = HashMap::new();
        for format in formats {
            *capacities.entry(format.family.clone()).or_default() += format.max_count;
        }

        let families = capacities
            .into_iter()
            .map(|(family, capacity)| (family, Self::lru(capacity)))
            .collect();

        Self {
            families,
            hits: 0,
            misses: 0,
        }
    }

    fn lru(capacity: usize) -> LruCache<ThumbnailKey, Arc<DynamicImage>> {
        LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    fn key(format: &ThumbnailFormat, id: &ImageId) -> ThumbnailKey {
        (id.clone(), format.name.clone())
    }

    /// Returns a thumbnail and marks it most recently used.
    pub fn get(&mut self, format: &ThumbnailFormat, id: &ImageId) -> Option<Arc<DynamicImage>> {
        let key = Self::key(format, id);
        let found = self
            .families
            .get_mut(&format.family)
            .and_then(|lru| lru.get(&key).cloned());

        if found.is_some() {
            self.hits += 1;
            trace!(id = %id, format = %format.name, "Thumbnail cache hit");
        } else {
            self.misses += 1;
            trace!(id = %id, format = %format.name, "Thumbnail cache miss");
        }
        found
    }

    /// Returns a thumbnail without touching recency or statistics.
    #[must_use]
    pub fn peek(&self, format: &ThumbnailFormat, id: &ImageId) -> Option<Arc<DynamicImage>> {
        self.families
            .get(&format.family)
            .and_then(|lru| lru.peek(&Self::key(format, id)).cloned())
    }

    /// Returns true if a thumbnail is stored, without promoting it.
    #[must_use]
    pub fn contains(&self, format: &ThumbnailFormat, id: &ImageId) -> bool {
        self.families
            .get(&format.family)
            .is_some_and(|lru| lru.contains(&Self::key(format, id)))
    }

    /// Stores a thumbnail. Returns the identity pushed out of the family, if any.
    pub fn put(
        &mut self,
        format: &ThumbnailFormat,
        id: ImageId,
        image: Arc<DynamicImage>,
    ) -> Option<ImageId> {
        let lru = self
            .families
            .entry(format.family.clone())
            .or_insert_with(|| Self::lru(format.max_count));

        let key = (id, format.name.clone());
        debug!(id = %key.0, format = %format.name, "Storing thumbnail");
        let evicted = lru
            .push(key.clone(), image)
            .filter(|(old_key, _)| *old_key != key)
            .map(|((old_id, _), _)| old_id);

        if let Some(old_id) = &evicted {
            debug!(id = %old_id, family = %format.family, "Evicted least recently used thumbnail");
        }
        evicted
    }

    /// Removes every thumbnail of `id`. Returns the number removed.
    pub fn evict(&mut self, id: &ImageId) -> usize {
        let mut removed = 0;
        for lru in self.families.values_mut() {
            let keys: Vec<ThumbnailKey> = lru
                .iter()
                .filter(|((key_id, _), _)| key_id == id)
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                if lru.pop(&key).is_some() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(id = %id, removed, "Evicted thumbnails");
        }
        removed
    }

    /// Removes every thumbnail.
    pub fn clear(&mut self) {
        for lru in self.families.values_mut() {
            lru.clear();
        }
        debug!("Cleared thumbnail store");
    }

    /// Number of stored thumbnails across all families.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.values().map(LruCache::len).sum()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity of a family, if registered.
    #[must_use]
    pub fn capacity(&self, family: &str) -> Option<usize> {
        self.families.get(family).map(|lru| lru.cap().get())
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 {
            (self.hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            size: self.len(),
        }
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached thumbnails.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Thumbnails: {} cached, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumb() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgba8(4, 4))
    }

    fn small_square() -> ThumbnailFormat {
        ThumbnailFormat::square(4).with_max_count(2)
    }

    #[test]
    fn test_put_and_get() {
        let format = small_square();
        let mut store = ThumbnailStore::new([&format]);
        let id = ImageId::new("a");

        assert!(store.put(&format, id.clone(), thumb()).is_none());
        assert_eq!(store.get(&format, &id).unwrap().width(), 4);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_eviction_is_lru() {
        let format = small_square();
        let mut store = ThumbnailStore::new([&format]);
        let (a, b, c) = (ImageId::new("a"), ImageId::new("b"), ImageId::new("c"));

        store.put(&format, a.clone(), thumb());
        store.put(&format, b.clone(), thumb());
        let _ = store.get(&format, &a);

        assert_eq!(store.put(&format, c.clone(), thumb()), Some(b.clone()));
        assert!(store.contains(&format, &a));
        assert!(!store.contains(&format, &b));
        assert!(store.contains(&format, &c));
    }

    #[test]
    fn test_peek_and_contains_do_not_promote() {
        let format = small_square();
        let mut store = ThumbnailStore::new([&format]);
        let (a, b, c) = (ImageId::new("a"), ImageId::new("b"), ImageId::new("c"));

        store.put(&format, a.clone(), thumb());
        store.put(&format, b.clone(), thumb());
        assert!(store.peek(&format, &a).is_some());
        assert!(store.contains(&format, &a));

        store.put(&format, c, thumb());
        assert!(store.peek(&format, &a).is_none());
        assert_eq!(store.stats().hits, 0);
    }

    #[test]
    fn test_families_evict_independently() {
        let square = small_square();
        let wide = ThumbnailFormat::new("wide", "banner", 8, 2, 1);
        let mut store = ThumbnailStore::new([&square, &wide]);
        let (a, b) = (ImageId::new("a"), ImageId::new("b"));

        store.put(&square, a.clone(), thumb());
        store.put(&square, b.clone(), thumb());
        store.put(&wide, a.clone(), thumb());
        assert_eq!(store.put(&wide, b.clone(), thumb()), Some(a.clone()));

        assert!(store.contains(&square, &a));
        assert!(store.contains(&square, &b));
        assert!(!store.contains(&wide, &a));
    }

    #[test]
    fn test_family_capacity_sums_formats() {
        let small = ThumbnailFormat::new("small", "square", 4, 4, 3);
        let large = ThumbnailFormat::new("large", "square", 8, 8, 5);
        let store = ThumbnailStore::new([&small, &large]);
        assert_eq!(store.capacity("square"), Some(8));
        assert_eq!(store.capacity("banner"), None);
    }

    #[test]
    fn test_replacing_entry_reports_no_eviction() {
        let format = small_square();
        let mut store = ThumbnailStore::new([&format]);
        let id = ImageId::new("a");
        store.put(&format, id.clone(), thumb());
        assert!(store.put(&format, id, thumb()).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evict_and_clear() {
        let square = small_square();
        let wide = ThumbnailFormat::new("wide", "banner", 8, 2, 4);
        let mut store = ThumbnailStore::new([&square, &wide]);
        let id = ImageId::new("a");

        store.put(&square, id.clone(), thumb());
        store.put(&wide, id.clone(), thumb());
        store.put(&wide, ImageId::new("b"), thumb());

        assert_eq!(store.evict(&id), 2);
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_stats() {
        let format = small_square();
        let mut store = ThumbnailStore::new([&format]);
        let id = ImageId::new("a");
        store.put(&format, id.clone(), thumb());

        let _ = store.get(&format, &id);
        let _ = store.get(&format, &ImageId::new("missing"));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert!(stats.to_string().contains("50.0%"));
    }
}
