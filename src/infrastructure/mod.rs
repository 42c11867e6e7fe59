//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image fetching, decoding and thumbnail caching.
pub mod image;

pub use config::{
    AppConfig, CliArgs, ConfigError, FetchConfig, GalleryConfig, LogLevel, StorageManager,
    ThumbnailConfig,
};
pub use image::{
    CacheStats, HttpByteFetcher, SourceLoadedEvent, SourceLoader, ThumbnailCache,
    fetch_source_image,
};
