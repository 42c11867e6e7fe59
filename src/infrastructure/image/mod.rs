//! Image handling infrastructure.
//!
//! This module provides:
//! - Network and file byte fetching with bounded concurrency
//! - Per-record source loading with cancellation
//! - Thumbnail production, coalescing and LRU storage

pub mod byte_fetcher;
pub mod source_loader;
pub mod thumbnail_cache;
pub mod thumbnail_store;

pub use byte_fetcher::HttpByteFetcher;
pub use source_loader::{SourceLoadedEvent, SourceLoader, decode_image, fetch_source_image};
pub use thumbnail_cache::{ThumbnailCache, crop_to_aspect};
pub use thumbnail_store::{CacheStats, ThumbnailStore};
