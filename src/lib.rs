//! Async Gallery - asynchronous image acquisition for paged photo viewers.
//!
//! This crate keeps a small window of full-resolution images loaded around the
//! visible position, pauses work that scrolls out of view, and serves square
//! thumbnails from a bounded cache that coalesces concurrent requests.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the gallery coordinator.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing fetchers, caches and configuration.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "async-gallery";
