//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{ImageId, ImageRecord, LoadState, Locator};
pub use errors::LoadError;
pub use ports::{ByteFetcherPort, GalleryEvent, ItemSource, ThumbnailStorePort};
