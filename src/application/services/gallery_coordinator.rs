//! Gallery coordinator.
//!
//! Owns the record table and drives source loading and thumbnail requests as
//! the visible position moves. Background completions are queued and applied
//! only through [`GalleryCoordinator::apply_completion`], so every record
//! mutation happens on the caller's sequence.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use image::DynamicImage;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::application::services::paging_window::PagingWindowManager;
use crate::domain::entities::{
    ImageId, ImageRecord, LoadState, Locator, SQUARE_FORMAT_NAME, StateChange,
};
use crate::domain::ports::{
    ByteFetcherPort, GalleryEvent, ItemSource, RecordObserver, ThumbnailLookup, ThumbnailResult,
    ThumbnailStorePort,
};
use crate::infrastructure::config::GalleryConfig;
use crate::infrastructure::image::{SourceLoadedEvent, SourceLoader};

/// A thumbnail request that finished.
#[derive(Debug)]
pub struct ThumbnailLoaded {
    /// Identity of the record.
    pub id: ImageId,
    /// Position the thumbnail was requested for.
    pub position: usize,
    /// Whether the thumbnail was already cached when requested.
    pub existed: bool,
    /// Produced thumbnail or failure.
    pub result: ThumbnailResult,
}

/// A background completion awaiting application.
#[derive(Debug)]
pub enum Completion {
    /// A source fetch finished.
    Source(SourceLoadedEvent),
    /// A thumbnail request finished.
    Thumbnail(ThumbnailLoaded),
}

/// A record chosen for full-screen display.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    /// Selected position.
    pub position: usize,
    /// The record at that position.
    pub record: Arc<ImageRecord>,
    /// Source image if loaded, else the thumbnail.
    pub image: Arc<DynamicImage>,
}

/// Outcome of selecting a position.
#[derive(Debug, Clone)]
pub enum Selection {
    /// The position has a thumbnail and can be shown.
    Ready(SelectedImage),
    /// Nothing to show yet.
    NotReady,
}

impl Selection {
    /// Returns true if the selection can be shown.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Coordinates records, the load window, source loading and thumbnails.
pub struct GalleryCoordinator {
    config: GalleryConfig,
    window: PagingWindowManager,
    thumbnails: Arc<dyn ThumbnailStorePort>,
    thumbnail_format: String,
    loader: SourceLoader,
    source_rx: mpsc::UnboundedReceiver<SourceLoadedEvent>,
    thumbnail_waits: FuturesUnordered<BoxFuture<'static, ThumbnailLoaded>>,
    thumbnail_pending: HashSet<ImageId>,
    events: mpsc::UnboundedSender<GalleryEvent>,
    item_source: Option<Arc<dyn ItemSource>>,
    records: HashMap<ImageId, Arc<ImageRecord>>,
    positions: HashMap<usize, ImageId>,
    active: HashMap<usize, ImageId>,
    current: Option<usize>,
    last_plan: Option<(usize, usize)>,
}

impl std::fmt::Debug for GalleryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryCoordinator")
            .field("config", &self.config)
            .field("thumbnail_format", &self.thumbnail_format)
            .field("records", &self.records.len())
            .field("current", &self.current)
            .field("in_flight", &self.loader.in_flight_count())
            .field("thumbnail_pending", &self.thumbnail_pending.len())
            .finish_non_exhaustive()
    }
}

impl GalleryCoordinator {
    /// Creates a coordinator publishing events on `events`.
    #[must_use]
    pub fn new(
        config: GalleryConfig,
        thumbnails: Arc<dyn ThumbnailStorePort>,
        fetcher: Arc<dyn ByteFetcherPort>,
        events: mpsc::UnboundedSender<GalleryEvent>,
    ) -> Self {
        let (source_tx, source_rx) = mpsc::unbounded_channel();
        Self {
            window: PagingWindowManager::new(config.window_radius),
            config,
            thumbnails,
            thumbnail_format: SQUARE_FORMAT_NAME.to_string(),
            loader: SourceLoader::new(fetcher, &source_tx),
            source_rx,
            thumbnail_waits: FuturesUnordered::new(),
            thumbnail_pending: HashSet::new(),
            events,
            item_source: None,
            records: HashMap::new(),
            positions: HashMap::new(),
            active: HashMap::new(),
            current: None,
            last_plan: None,
        }
    }

    /// Sets the thumbnail format requested from the store.
    #[must_use]
    pub fn with_thumbnail_format(mut self, format: impl Into<String>) -> Self {
        self.thumbnail_format = format.into();
        self
    }

    /// Binds the item provider.
    ///
    /// Drops the cached position mapping. Records stay keyed by identity, and
    /// the next [`Self::on_position_changed`] purges whatever left the window.
    pub fn set_item_source(&mut self, source: Arc<dyn ItemSource>) {
        debug!(count = source.count(), "Binding item source");
        for id in self.positions.values() {
            if let Some(record) = self.records.get(id) {
                record.set_position(None);
            }
        }
        self.positions.clear();
        self.item_source = Some(source);
        self.last_plan = None;
    }

    /// Moves the load window to `position`.
    ///
    /// Records leaving the window are purged before records entering it are
    /// loaded, nearest first. Returns the transitions applied.
    pub fn on_position_changed(&mut self, position: usize) -> Vec<StateChange> {
        let count = self.item_count();
        let plan = self.window.plan(position, count);
        if count > 0 && self.last_plan == Some((plan.position, count)) {
            trace!(position = plan.position, "Window unchanged");
            return Vec::new();
        }

        let window: Vec<(usize, Arc<ImageRecord>)> = plan
            .load
            .iter()
            .filter_map(|&p| self.record_at(p).map(|record| (p, record)))
            .collect();
        let in_window: HashSet<ImageId> = window
            .iter()
            .map(|(_, record)| record.identity().clone())
            .collect();

        let mut changes = Vec::new();
        let mut previous: Vec<(usize, ImageId)> = std::mem::take(&mut self.active).into_iter().collect();
        previous.sort_unstable_by_key(|(p, _)| *p);
        for (_, id) in previous {
            if in_window.contains(&id) {
                continue;
            }
            if let Some(record) = self.records.get(&id) {
                changes.extend(self.loader.purge(record, self.config.release_source_on_purge));
            }
        }

        for (p, record) in &window {
            self.active.insert(*p, record.identity().clone());
            changes.extend(self.load(record));
            self.request_thumbnail(*p, record);
        }

        debug!(
            position = plan.position,
            count,
            loads = window.len(),
            changes = changes.len(),
            "Position changed"
        );
        self.current = (count > 0).then_some(plan.position);
        self.last_plan = (count > 0).then_some((plan.position, count));
        self.publish(&changes);
        changes
    }

    /// Requests thumbnails for grid cells in `range` without loading sources.
    pub fn prefetch_thumbnails(&mut self, range: Range<usize>) {
        let end = range.end.min(self.item_count());
        for position in range.start..end {
            if let Some(record) = self.record_at(position) {
                self.request_thumbnail(position, &record);
            }
        }
    }

    /// Selects a position for full-screen display.
    ///
    /// Only positions with a thumbnail are selectable; anything else is a
    /// no-op returning [`Selection::NotReady`].
    pub fn on_selection(&mut self, position: usize) -> Selection {
        let Some(record) = self.record_at(position) else {
            return Selection::NotReady;
        };
        let snapshot = record.snapshot();
        if !snapshot.is_ready() {
            trace!(position, "Selection ignored, no thumbnail yet");
            return Selection::NotReady;
        }
        let Some(image) = snapshot.source_image.or(snapshot.thumbnail) else {
            return Selection::NotReady;
        };

        self.emit(GalleryEvent::SelectionAvailable {
            position,
            image: image.clone(),
        });
        Selection::Ready(SelectedImage {
            position,
            record,
            image,
        })
    }

    /// Invalidates a record and restarts it if it is in the window.
    pub fn reload(&mut self, position: usize) -> Vec<StateChange> {
        let Some(record) = self.record_at(position) else {
            return Vec::new();
        };

        let mut changes: Vec<StateChange> = self.loader.cancel(&record).into_iter().collect();
        if self.active.get(&position) == Some(record.identity()) {
            changes.extend(self.loader.start(&record));
            self.request_thumbnail(position, &record);
        }
        debug!(position, id = %record.identity(), "Reloaded record");
        self.publish(&changes);
        changes
    }

    /// Returns the record at `position`, creating it if needed.
    pub fn current_record(&mut self, position: usize) -> Option<Arc<ImageRecord>> {
        self.record_at(position)
    }

    /// Attaches a presentation observer to the record at `position`.
    pub fn register_observer(&mut self, position: usize, observer: Weak<dyn RecordObserver>) -> bool {
        self.record_at(position).is_some_and(|record| {
            record.set_observer(observer);
            true
        })
    }

    /// Detaches the observer of the record at `position`.
    pub fn unregister_observer(&mut self, position: usize) -> bool {
        self.positions
            .get(&position)
            .and_then(|id| self.records.get(id))
            .is_some_and(|record| {
                record.clear_observer();
                true
            })
    }

    /// Waits for the next background completion.
    ///
    /// Cancel safe. Returns `None` once nothing is in flight and no
    /// completion is queued.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.thumbnail_waits.is_empty() && self.loader.in_flight_count() == 0 {
            // Late sends from cancelled fetches may still be queued.
            return self.source_rx.try_recv().ok().map(Completion::Source);
        }
        tokio::select! {
            Some(loaded) = self.thumbnail_waits.next(), if !self.thumbnail_waits.is_empty() => {
                Some(Completion::Thumbnail(loaded))
            }
            Some(event) = self.source_rx.recv() => Some(Completion::Source(event)),
            else => None,
        }
    }

    /// Applies a completion to its record and publishes the outcome.
    pub fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Source(event) => {
                let Some(record) = self.records.get(&event.id).cloned() else {
                    trace!(id = %event.id, "Completion for unknown record");
                    return;
                };
                if let Some(change) = self.loader.complete(&record, event) {
                    self.publish(std::slice::from_ref(&change));
                }
            }
            Completion::Thumbnail(loaded) => {
                self.thumbnail_pending.remove(&loaded.id);
                let record = self.records.get(&loaded.id).cloned();
                match loaded.result {
                    Ok(image) => {
                        let stored = record.is_some_and(|r| r.set_thumbnail(image));
                        if stored && !loaded.existed {
                            for position in self.positions_of(&loaded.id, loaded.position) {
                                self.emit(GalleryEvent::ThumbnailReady { position });
                            }
                        }
                    }
                    Err(error) => {
                        warn!(id = %loaded.id, position = loaded.position, error = %error, "Thumbnail unavailable");
                        for position in self.positions_of(&loaded.id, loaded.position) {
                            self.emit(GalleryEvent::ThumbnailFailed {
                                position,
                                error: error.clone(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Waits for and applies one completion. Returns false when idle.
    pub async fn process_next(&mut self) -> bool {
        match self.next_completion().await {
            Some(completion) => {
                self.apply_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Applies every completion that is already available, without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            if let Ok(event) = self.source_rx.try_recv() {
                self.apply_completion(Completion::Source(event));
            } else if !self.thumbnail_waits.is_empty()
                && let Some(Some(loaded)) = self.thumbnail_waits.next().now_or_never()
            {
                self.apply_completion(Completion::Thumbnail(loaded));
            } else {
                break;
            }
            applied += 1;
        }
        applied
    }

    /// Number of items in the bound source.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.item_source.as_ref().map_or(0, |source| source.count())
    }

    /// Current (clamped) position, once one was applied.
    #[must_use]
    pub const fn current_position(&self) -> Option<usize> {
        self.current
    }

    /// Looks up a record by identity.
    #[must_use]
    pub fn record_for_identity(&self, id: &ImageId) -> Option<Arc<ImageRecord>> {
        self.records.get(id).cloned()
    }

    /// In-window positions, ascending.
    #[must_use]
    pub fn active_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.active.keys().copied().collect();
        positions.sort_unstable();
        positions
    }

    /// Number of source fetches in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.loader.in_flight_count()
    }

    /// Number of thumbnail requests awaiting completion.
    #[must_use]
    pub fn pending_thumbnail_count(&self) -> usize {
        self.thumbnail_pending.len()
    }

    fn load(&mut self, record: &ImageRecord) -> Vec<StateChange> {
        match record.state() {
            LoadState::NotLoaded => self.loader.start(record),
            LoadState::Paused => self.loader.resume(record),
            LoadState::Failed if record.retry_armed() => {
                debug!(id = %record.identity(), "Retrying failed image after window re-entry");
                self.loader.start(record)
            }
            LoadState::Failed | LoadState::Loading | LoadState::Ready => Vec::new(),
        }
    }

    fn record_at(&mut self, position: usize) -> Option<Arc<ImageRecord>> {
        if position >= self.item_count() {
            return None;
        }
        if let Some(record) = self
            .positions
            .get(&position)
            .and_then(|id| self.records.get(id))
        {
            return Some(record.clone());
        }

        let locator = Locator::new(self.item_source.as_ref()?.locator_for_position(position)?);
        let id = locator.identity();
        let record = self
            .records
            .entry(id.clone())
            .or_insert_with(|| {
                trace!(id = %id, position, "Creating record");
                Arc::new(ImageRecord::new(locator))
            })
            .clone();
        record.set_position(Some(position));
        self.positions.insert(position, id);
        Some(record)
    }

    /// Mapped positions sharing `id`, plus the requesting one.
    fn positions_of(&self, id: &ImageId, requested: usize) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .positions
            .iter()
            .filter(|(_, mapped)| *mapped == id)
            .map(|(p, _)| *p)
            .collect();
        if !positions.contains(&requested) {
            positions.push(requested);
        }
        positions.sort_unstable();
        positions
    }

    fn request_thumbnail(&mut self, position: usize, record: &ImageRecord) {
        if record.thumbnail().is_some() || self.thumbnail_pending.contains(record.identity()) {
            return;
        }

        let id = record.identity().clone();
        let existed = self.thumbnails.exists(&id, &self.thumbnail_format);
        match self.thumbnails.get(&id, record.locator(), &self.thumbnail_format) {
            Ok(ThumbnailLookup::Cached(image)) => {
                record.set_thumbnail(image);
                if !existed {
                    self.emit(GalleryEvent::ThumbnailReady { position });
                }
            }
            Ok(lookup) => {
                trace!(id = %id, position, "Awaiting thumbnail");
                self.thumbnail_pending.insert(id.clone());
                self.thumbnail_waits.push(
                    async move {
                        let result = lookup.wait().await;
                        ThumbnailLoaded {
                            id,
                            position,
                            existed,
                            result,
                        }
                    }
                    .boxed(),
                );
            }
            Err(error) => {
                warn!(id = %id, position, error = %error, "Thumbnail request rejected");
                self.emit(GalleryEvent::ThumbnailFailed { position, error });
            }
        }
    }

    fn publish(&self, changes: &[StateChange]) {
        for change in changes {
            self.emit(GalleryEvent::RecordStateChanged {
                identity: change.identity.clone(),
                old: change.old,
                new: change.new,
            });
        }
    }

    fn emit(&self, event: GalleryEvent) {
        if self.events.send(event).is_err() {
            trace!("Gallery event receiver dropped");
        }
    }
}
