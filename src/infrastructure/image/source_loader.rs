//! Per-record source image fetching.
//!
//! Each record has at most one transfer in flight. Transfers run on spawned
//! tasks and report back over a channel; the owner applies the completion on
//! its own sequence, where stale generations are discarded.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use crate::domain::entities::{ImageId, ImageRecord, LoadInput, Locator, StateChange};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::ByteFetcherPort;

/// Message sent when a source fetch finishes.
#[derive(Debug, Clone)]
pub struct SourceLoadedEvent {
    /// The image ID.
    pub id: ImageId,
    /// Generation the fetch was issued under.
    pub generation: u64,
    /// The decoded image, or the failure.
    pub result: LoadResult<Arc<DynamicImage>>,
}

/// Decodes image bytes off the async workers.
///
/// # Errors
/// Returns `LoadError::Decode` if the bytes are not a supported image.
pub async fn decode_image(bytes: Bytes) -> LoadResult<DynamicImage> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| LoadError::decode(format!("Decode task panicked: {e}")))?
        .map_err(|e| LoadError::decode(format!("Failed to decode image: {e}")))
}

/// Fetches and decodes the full-resolution image behind a locator.
///
/// # Errors
/// Returns transport errors from the fetcher and decode errors from the bytes.
pub async fn fetch_source_image(
    fetcher: &dyn ByteFetcherPort,
    locator: &Locator,
) -> LoadResult<Arc<DynamicImage>> {
    let bytes = fetcher.fetch(locator).await?;
    let size = bytes.len();
    let decoded = decode_image(bytes).await?;
    trace!(
        locator = %locator,
        size,
        width = decoded.width(),
        height = decoded.height(),
        "Decoded source image"
    );
    Ok(Arc::new(decoded))
}

struct InFlight {
    generation: u64,
    handle: AbortHandle,
}

/// Drives the fetch state machine of image records.
pub struct SourceLoader {
    fetcher: Arc<dyn ByteFetcherPort>,
    event_tx: mpsc::UnboundedSender<SourceLoadedEvent>,
    in_flight: HashMap<ImageId, InFlight>,
}

impl std::fmt::Debug for SourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLoader")
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl SourceLoader {
    /// Creates a loader reporting completions on `event_tx`.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn ByteFetcherPort>,
        event_tx: &mpsc::UnboundedSender<SourceLoadedEvent>,
    ) -> Self {
        Self {
            fetcher,
            event_tx: event_tx.clone(),
            in_flight: HashMap::new(),
        }
    }

    /// Issues a fetch unless one is in flight or the source is ready.
    pub fn start(&mut self, record: &ImageRecord) -> Vec<StateChange> {
        self.issue(record, LoadInput::Start)
    }

    /// Restarts a paused fetch.
    ///
    /// A record that kept its source image while paused completes at once.
    pub fn resume(&mut self, record: &ImageRecord) -> Vec<StateChange> {
        self.issue(record, LoadInput::Resume)
    }

    /// Suspends an in-flight fetch.
    pub fn pause(&mut self, record: &ImageRecord) -> Option<StateChange> {
        let change = record.apply(LoadInput::Pause);
        self.abort(record.identity());
        change
    }

    /// Takes a record out of the load window.
    pub fn purge(&mut self, record: &ImageRecord, release_source: bool) -> Option<StateChange> {
        let change = record.apply(LoadInput::Purge { release_source });
        self.abort(record.identity());
        change
    }

    /// Aborts any transfer and resets the record to `NotLoaded`.
    pub fn cancel(&mut self, record: &ImageRecord) -> Option<StateChange> {
        self.abort(record.identity());
        record.apply(LoadInput::Cancel)
    }

    /// Applies a completion to its record.
    ///
    /// Completions from an older generation are dropped.
    pub fn complete(
        &mut self,
        record: &ImageRecord,
        event: SourceLoadedEvent,
    ) -> Option<StateChange> {
        if self
            .in_flight
            .get(&event.id)
            .is_some_and(|f| f.generation == event.generation)
        {
            self.in_flight.remove(&event.id);
        }

        let input = match event.result {
            Ok(image) => LoadInput::Succeeded {
                generation: event.generation,
                image,
            },
            Err(error) => {
                warn!(id = %event.id, generation = event.generation, error = %error, "Source fetch failed");
                LoadInput::Failed {
                    generation: event.generation,
                    error,
                }
            }
        };

        let change = record.apply(input);
        if let Some(change) = &change {
            debug!(id = %change.identity, state = %change.new, "Source fetch completed");
        }
        change
    }

    /// Returns true if a transfer is in flight for `id`.
    #[must_use]
    pub fn is_in_flight(&self, id: &ImageId) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Returns the number of transfers in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Aborts every transfer without touching records.
    pub fn cancel_all(&mut self) {
        let count = self.in_flight.len();
        for (_, flight) in self.in_flight.drain() {
            flight.handle.abort();
        }
        if count > 0 {
            debug!(count, "Cancelled all source fetches");
        }
    }

    fn issue(&mut self, record: &ImageRecord, input: LoadInput) -> Vec<StateChange> {
        let Some(change) = record.apply(input) else {
            return Vec::new();
        };
        let generation = change.generation;
        let mut changes = vec![change];

        if let Some(image) = record.source_image() {
            debug!(id = %record.identity(), "Reusing retained source image");
            changes.extend(record.apply(LoadInput::Succeeded { generation, image }));
            return changes;
        }

        self.spawn_fetch(record, generation);
        changes
    }

    fn spawn_fetch(&mut self, record: &ImageRecord, generation: u64) {
        let id = record.identity().clone();
        let locator = record.locator().clone();
        let fetcher = self.fetcher.clone();
        let event_tx = self.event_tx.clone();

        debug!(id = %id, generation, locator = %locator, "Issuing source fetch");

        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let result = fetch_source_image(fetcher.as_ref(), &locator).await;
            let event = SourceLoadedEvent {
                id: task_id,
                generation,
                result,
            };
            let _ = event_tx.send(event);
        });

        let flight = InFlight {
            generation,
            handle: handle.abort_handle(),
        };
        if let Some(previous) = self.in_flight.insert(id, flight) {
            previous.handle.abort();
        }
    }

    fn abort(&mut self, id: &ImageId) {
        if let Some(flight) = self.in_flight.remove(id) {
            flight.handle.abort();
            trace!(id = %id, generation = flight.generation, "Aborted source fetch");
        }
    }
}

impl Drop for SourceLoader {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::entities::LoadState;
    use crate::domain::ports::mocks::{MockByteFetcher, png_bytes};

    const URL: &str = "https://example.com/abc.png";

    fn loader_with(
        fetcher: Arc<MockByteFetcher>,
    ) -> (SourceLoader, mpsc::UnboundedReceiver<SourceLoadedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SourceLoader::new(fetcher, &tx), rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<SourceLoadedEvent>) -> SourceLoadedEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("completion in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_start_reaches_ready() {
        let fetcher = Arc::new(MockByteFetcher::new());
        fetcher.respond_png(URL, 8, 4);
        let (mut loader, mut rx) = loader_with(fetcher.clone());
        let record = ImageRecord::new(URL);

        let changes = loader.start(&record);
        assert_eq!(changes.len(), 1);
        assert_eq!(record.state(), LoadState::Loading);
        assert!(loader.is_in_flight(record.identity()));

        let event = next_event(&mut rx).await;
        let change = loader.complete(&record, event).unwrap();
        assert_eq!((change.old, change.new), (LoadState::Loading, LoadState::Ready));
        assert_eq!(record.source_image().unwrap().width(), 8);
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_start_while_loading_is_noop() {
        let (fetcher, _gate) = MockByteFetcher::gated();
        let fetcher = Arc::new(fetcher);
        let (mut loader, _rx) = loader_with(fetcher.clone());
        let record = ImageRecord::new(URL);

        assert_eq!(loader.start(&record).len(), 1);
        assert!(loader.start(&record).is_empty());
        fetcher.wait_for_calls(1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(loader.in_flight_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let fetcher = Arc::new(MockByteFetcher::new());
        fetcher.respond(URL, Err(LoadError::transport("HTTP 503")));
        let (mut loader, mut rx) = loader_with(fetcher.clone());
        let record = ImageRecord::new(URL);

        loader.start(&record);
        let event = next_event(&mut rx).await;
        loader.complete(&record, event);

        assert_eq!(record.state(), LoadState::Failed);
        assert!(record.last_error().unwrap().is_transport());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_bytes_fail_with_decode_error() {
        let fetcher = Arc::new(MockByteFetcher::new());
        fetcher.respond(URL, Ok(Bytes::from_static(b"definitely not a png")));
        let (mut loader, mut rx) = loader_with(fetcher);
        let record = ImageRecord::new(URL);

        loader.start(&record);
        let event = next_event(&mut rx).await;
        loader.complete(&record, event);

        assert_eq!(record.state(), LoadState::Failed);
        assert!(record.last_error().unwrap().is_decode());
    }

    #[tokio::test]
    async fn test_pause_aborts_transfer() {
        let (fetcher, gate) = MockByteFetcher::gated();
        let fetcher = Arc::new(fetcher);
        fetcher.respond_png(URL, 2, 2);
        let (mut loader, mut rx) = loader_with(fetcher.clone());
        let record = ImageRecord::new(URL);

        loader.start(&record);
        fetcher.wait_for_calls(1).await;

        let change = loader.pause(&record).unwrap();
        assert_eq!(change.new, LoadState::Paused);
        assert_eq!(loader.in_flight_count(), 0);

        gate.add_permits(1);
        let late = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(late.is_err());
        assert!(loader.pause(&record).is_none());
    }

    #[tokio::test]
    async fn test_resume_refetches_released_source() {
        let fetcher = Arc::new(MockByteFetcher::new());
        fetcher.respond_png(URL, 2, 2);
        let (mut loader, mut rx) = loader_with(fetcher.clone());
        let record = ImageRecord::new(URL);

        loader.start(&record);
        let event = next_event(&mut rx).await;
        loader.complete(&record, event);
        loader.purge(&record, true);
        assert!(record.source_image().is_none());

        let changes = loader.resume(&record);
        assert_eq!(changes.len(), 1);
        let event = next_event(&mut rx).await;
        loader.complete(&record, event);

        assert_eq!(record.state(), LoadState::Ready);
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_resume_with_retained_source_skips_fetch() {
        let fetcher = Arc::new(MockByteFetcher::new());
        fetcher.respond_png(URL, 2, 2);
        let (mut loader, mut rx) = loader_with(fetcher.clone());
        let record = ImageRecord::new(URL);

        loader.start(&record);
        let event = next_event(&mut rx).await;
        loader.complete(&record, event);

        let purged = loader.purge(&record, false).unwrap();
        assert_eq!(purged.new, LoadState::Paused);

        let states: Vec<_> = loader
            .resume(&record)
            .into_iter()
            .map(|c| (c.old, c.new))
            .collect();
        assert_eq!(
            states,
            vec![
                (LoadState::Paused, LoadState::Loading),
                (LoadState::Loading, LoadState::Ready)
            ]
        );
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_late_completion_after_cancel_is_discarded() {
        let (fetcher, _gate) = MockByteFetcher::gated();
        let (mut loader, _rx) = loader_with(Arc::new(fetcher));
        let record = ImageRecord::new(URL);

        let generation = loader.start(&record)[0].generation;
        loader.cancel(&record).unwrap();
        assert!(loader.cancel(&record).is_none());

        let decoded = decode_image(png_bytes(2, 2)).await.unwrap();
        let late = SourceLoadedEvent {
            id: record.identity().clone(),
            generation,
            result: Ok(Arc::new(decoded)),
        };
        assert!(loader.complete(&record, late).is_none());
        assert_eq!(record.state(), LoadState::NotLoaded);
        assert!(record.source_image().is_none());
    }

    #[tokio::test]
    async fn test_cancel_all_clears_in_flight() {
        let (fetcher, _gate) = MockByteFetcher::gated();
        let (mut loader, _rx) = loader_with(Arc::new(fetcher));
        let a = ImageRecord::new("https://example.com/a.png");
        let b = ImageRecord::new("https://example.com/b.png");

        loader.start(&a);
        loader.start(&b);
        assert_eq!(loader.in_flight_count(), 2);

        loader.cancel_all();
        assert_eq!(loader.in_flight_count(), 0);
    }
}
