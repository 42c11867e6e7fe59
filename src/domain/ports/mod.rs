//! Port definitions.

mod byte_fetcher_port;
mod gallery_observer_port;
mod item_source_port;
mod thumbnail_store_port;

pub use byte_fetcher_port::ByteFetcherPort;
pub use gallery_observer_port::{GalleryEvent, RecordObserver};
pub use item_source_port::ItemSource;
pub use thumbnail_store_port::{ThumbnailLookup, ThumbnailResult, ThumbnailStorePort};
