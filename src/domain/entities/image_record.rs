//! Per-image record: identity, load state and cached bitmaps.

use std::sync::{Arc, Weak};

use image::DynamicImage;
use parking_lot::RwLock;
use tracing::trace;

use crate::domain::entities::{ImageId, LoadInput, LoadState, Locator, StateChange};
use crate::domain::errors::LoadError;
use crate::domain::ports::RecordObserver;

#[derive(Default)]
struct RecordInner {
    position: Option<usize>,
    state: LoadState,
    thumbnail: Option<Arc<DynamicImage>>,
    source_image: Option<Arc<DynamicImage>>,
    generation: u64,
    last_error: Option<LoadError>,
    retry_armed: bool,
}

/// Consistent point-in-time view of a record.
#[derive(Debug, Clone)]
pub struct RecordSnapshot {
    /// Identity of the record.
    pub identity: ImageId,
    /// Position currently associated with the record.
    pub position: Option<usize>,
    /// Load state.
    pub state: LoadState,
    /// Thumbnail, if resolved.
    pub thumbnail: Option<Arc<DynamicImage>>,
    /// Full-resolution source image, if held.
    pub source_image: Option<Arc<DynamicImage>>,
    /// Error of the last failed fetch.
    pub last_error: Option<LoadError>,
    /// Fetch generation.
    pub generation: u64,
}

impl RecordSnapshot {
    /// Returns true if the record can be selected for full-screen display.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.thumbnail.is_some()
    }
}

/// A gallery image and everything known about it.
///
/// Field updates are applied under one lock, so readers on other threads
/// never see a partial transition. The observer is held weakly and never
/// keeps the presentation side alive.
pub struct ImageRecord {
    identity: ImageId,
    locator: Locator,
    inner: RwLock<RecordInner>,
    observer: RwLock<Option<Weak<dyn RecordObserver>>>,
}

impl std::fmt::Debug for ImageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ImageRecord")
            .field("identity", &self.identity)
            .field("locator", &self.locator)
            .field("position", &inner.position)
            .field("state", &inner.state)
            .field("has_thumbnail", &inner.thumbnail.is_some())
            .field("has_source", &inner.source_image.is_some())
            .field("generation", &inner.generation)
            .finish_non_exhaustive()
    }
}

impl ImageRecord {
    /// Creates a record for a locator.
    #[must_use]
    pub fn new(locator: impl Into<Locator>) -> Self {
        let locator = locator.into();
        Self {
            identity: locator.identity(),
            locator,
            inner: RwLock::new(RecordInner::default()),
            observer: RwLock::new(None),
        }
    }

    /// Creates a record bound to a position.
    #[must_use]
    pub fn with_position(locator: impl Into<Locator>, position: usize) -> Self {
        let record = Self::new(locator);
        record.set_position(Some(position));
        record
    }

    /// Returns the identity.
    #[must_use]
    pub const fn identity(&self) -> &ImageId {
        &self.identity
    }

    /// Returns the locator.
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Returns the position currently associated with the record.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.inner.read().position
    }

    /// Reassigns the position.
    pub fn set_position(&self, position: Option<usize>) {
        self.inner.write().position = position;
    }

    /// Returns the load state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.inner.read().state
    }

    /// Returns the thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<Arc<DynamicImage>> {
        self.inner.read().thumbnail.clone()
    }

    /// Returns the source image.
    #[must_use]
    pub fn source_image(&self) -> Option<Arc<DynamicImage>> {
        self.inner.read().source_image.clone()
    }

    /// Returns the current fetch generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Returns the error of the last failed fetch.
    #[must_use]
    pub fn last_error(&self) -> Option<LoadError> {
        self.inner.read().last_error.clone()
    }

    /// Returns true if a failed record left the load window and may be retried.
    #[must_use]
    pub fn retry_armed(&self) -> bool {
        self.inner.read().retry_armed
    }

    /// Returns true if the record can be selected for full-screen display.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.read().thumbnail.is_some()
    }

    /// Returns a consistent view of all mutable fields.
    #[must_use]
    pub fn snapshot(&self) -> RecordSnapshot {
        let inner = self.inner.read();
        RecordSnapshot {
            identity: self.identity.clone(),
            position: inner.position,
            state: inner.state,
            thumbnail: inner.thumbnail.clone(),
            source_image: inner.source_image.clone(),
            last_error: inner.last_error.clone(),
            generation: inner.generation,
        }
    }

    /// Sets the thumbnail if none is held. Returns true if it was stored.
    pub fn set_thumbnail(&self, thumbnail: Arc<DynamicImage>) -> bool {
        let mut inner = self.inner.write();
        if inner.thumbnail.is_some() {
            return false;
        }
        inner.thumbnail = Some(thumbnail);
        true
    }

    /// Drops the thumbnail after a cache eviction.
    pub fn clear_thumbnail(&self) {
        self.inner.write().thumbnail = None;
    }

    /// Registers the observer notified on state transitions.
    pub fn set_observer(&self, observer: Weak<dyn RecordObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Removes the observer.
    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    /// Returns true if a live observer is registered.
    #[must_use]
    pub fn has_observer(&self) -> bool {
        self.observer
            .read()
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Applies a state machine input.
    ///
    /// Returns the transition, or `None` when the input is a no-op for the
    /// current state or a completion from an older generation.
    pub fn apply(&self, input: LoadInput) -> Option<StateChange> {
        let change = {
            let mut inner = self.inner.write();

            if let Some(generation) = input.completion_generation()
                && generation != inner.generation
            {
                trace!(
                    id = %self.identity,
                    generation,
                    current = inner.generation,
                    "Dropping stale completion"
                );
                return None;
            }

            let old = inner.state;
            let Some(new) = old.next(&input) else {
                if matches!(input, LoadInput::Purge { .. }) && old == LoadState::Failed {
                    inner.retry_armed = true;
                }
                trace!(id = %self.identity, input = input.name(), state = %old, "Ignored input");
                return None;
            };

            match input {
                LoadInput::Start | LoadInput::Resume => {
                    inner.generation += 1;
                    inner.retry_armed = false;
                    inner.last_error = None;
                }
                LoadInput::Pause => {
                    inner.generation += 1;
                }
                LoadInput::Purge { release_source } => {
                    if old == LoadState::Loading {
                        inner.generation += 1;
                    }
                    if release_source {
                        inner.source_image = None;
                    }
                }
                LoadInput::Cancel => {
                    inner.generation += 1;
                    inner.source_image = None;
                    inner.retry_armed = false;
                    inner.last_error = None;
                }
                LoadInput::Succeeded { image, .. } => {
                    inner.source_image = Some(image);
                }
                LoadInput::Failed { error, .. } => {
                    inner.last_error = Some(error);
                }
            }
            inner.state = new;

            StateChange {
                identity: self.identity.clone(),
                old,
                new,
                generation: inner.generation,
            }
        };

        self.notify(&change);
        Some(change)
    }

    fn notify(&self, change: &StateChange) {
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.on_state_changed(&change.identity, change.old, change.new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<(LoadState, LoadState)>>,
    }

    impl RecordObserver for RecordingObserver {
        fn on_state_changed(&self, _identity: &ImageId, old: LoadState, new: LoadState) {
            self.seen.lock().push((old, new));
        }
    }

    fn pixel() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgb8(2, 2))
    }

    #[test]
    fn test_same_locator_same_identity() {
        let a = ImageRecord::new("https://example.com/a.jpg");
        let b = ImageRecord::with_position("https://example.com/a.jpg", 7);
        assert_eq!(a.identity(), b.identity());
        assert_eq!(b.position(), Some(7));
    }

    #[test]
    fn test_ready_requires_thumbnail() {
        let record = ImageRecord::new("a.png");
        assert!(!record.is_ready());
        assert!(record.set_thumbnail(pixel()));
        assert!(!record.set_thumbnail(pixel()));
        assert!(record.is_ready());
        record.clear_thumbnail();
        assert!(!record.is_ready());
    }

    #[test]
    fn test_success_sets_source_image() {
        let record = ImageRecord::new("a.png");
        let start = record.apply(LoadInput::Start).unwrap();
        assert_eq!((start.old, start.new), (LoadState::NotLoaded, LoadState::Loading));

        let done = record
            .apply(LoadInput::Succeeded {
                generation: start.generation,
                image: pixel(),
            })
            .unwrap();
        assert_eq!(done.new, LoadState::Ready);
        assert!(record.source_image().is_some());
    }

    #[test]
    fn test_late_completion_after_cancel_is_dropped() {
        let record = ImageRecord::new("a.png");
        let start = record.apply(LoadInput::Start).unwrap();
        record.apply(LoadInput::Cancel).unwrap();

        let late = record.apply(LoadInput::Succeeded {
            generation: start.generation,
            image: pixel(),
        });
        assert!(late.is_none());
        assert_eq!(record.state(), LoadState::NotLoaded);
        assert!(record.source_image().is_none());
    }

    #[test]
    fn test_completion_from_before_pause_is_dropped_after_resume() {
        let record = ImageRecord::new("a.png");
        let first = record.apply(LoadInput::Start).unwrap();
        record.apply(LoadInput::Pause).unwrap();
        record.apply(LoadInput::Resume).unwrap();

        let stale = record.apply(LoadInput::Failed {
            generation: first.generation,
            error: LoadError::transport("aborted"),
        });
        assert!(stale.is_none());
        assert_eq!(record.state(), LoadState::Loading);
    }

    #[test]
    fn test_cancel_without_transfer_is_noop() {
        let record = ImageRecord::new("a.png");
        assert!(record.apply(LoadInput::Cancel).is_none());
        assert_eq!(record.generation(), 0);
    }

    #[test]
    fn test_purge_ready_releases_or_keeps_source() {
        let record = ImageRecord::new("a.png");
        let start = record.apply(LoadInput::Start).unwrap();
        record.apply(LoadInput::Succeeded {
            generation: start.generation,
            image: pixel(),
        });

        record
            .apply(LoadInput::Purge {
                release_source: false,
            })
            .unwrap();
        assert_eq!(record.state(), LoadState::Paused);
        assert!(record.source_image().is_some());

        let resumed = record.apply(LoadInput::Resume).unwrap();
        record.apply(LoadInput::Succeeded {
            generation: resumed.generation,
            image: pixel(),
        });
        record
            .apply(LoadInput::Purge {
                release_source: true,
            })
            .unwrap();
        assert!(record.source_image().is_none());
    }

    #[test]
    fn test_purge_arms_retry_for_failed_record() {
        let record = ImageRecord::new("a.png");
        let start = record.apply(LoadInput::Start).unwrap();
        record.apply(LoadInput::Failed {
            generation: start.generation,
            error: LoadError::transport("timeout"),
        });
        assert!(!record.retry_armed());
        assert!(record.last_error().is_some());

        assert!(
            record
                .apply(LoadInput::Purge {
                    release_source: true
                })
                .is_none()
        );
        assert!(record.retry_armed());
        assert_eq!(record.state(), LoadState::Failed);

        record.apply(LoadInput::Start).unwrap();
        assert!(!record.retry_armed());
        assert!(record.last_error().is_none());
    }

    #[test]
    fn test_observer_is_notified_and_not_retained() {
        let record = ImageRecord::new("a.png");
        let observer = Arc::new(RecordingObserver::default());
        let weak: Weak<dyn RecordObserver> = Arc::downgrade(&observer) as Weak<dyn RecordObserver>;
        record.set_observer(weak);

        record.apply(LoadInput::Start);
        assert_eq!(
            observer.seen.lock().as_slice(),
            &[(LoadState::NotLoaded, LoadState::Loading)]
        );
        assert_eq!(Arc::strong_count(&observer), 1);
        assert!(record.has_observer());

        drop(observer);
        assert!(!record.has_observer());
        record.apply(LoadInput::Pause);
        assert_eq!(record.state(), LoadState::Paused);
    }
}
