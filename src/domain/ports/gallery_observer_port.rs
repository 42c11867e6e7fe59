//! Notifications published to the presentation layer.

use std::sync::Arc;

use image::DynamicImage;

use crate::domain::entities::{ImageId, LoadState};
use crate::domain::errors::LoadError;

/// Presentation-side listener attached to a single record.
///
/// Called synchronously on the sequence that mutates the record, so
/// implementations must only enqueue lightweight work.
pub trait RecordObserver: Send + Sync {
    /// Called after every state transition of the observed record.
    fn on_state_changed(&self, identity: &ImageId, old: LoadState, new: LoadState);
}

/// Event published by the gallery coordinator.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum GalleryEvent {
    /// A record changed load state.
    RecordStateChanged {
        identity: ImageId,
        old: LoadState,
        new: LoadState,
    },
    /// A thumbnail that did not exist before became available.
    ThumbnailReady { position: usize },
    /// Thumbnail production failed for a position.
    ThumbnailFailed { position: usize, error: LoadError },
    /// A ready position was selected for full-screen display.
    SelectionAvailable {
        position: usize,
        image: Arc<DynamicImage>,
    },
}
