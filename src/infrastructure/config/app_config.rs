//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::entities::{
    DEFAULT_MAX_COUNT, DEFAULT_THUMBNAIL_SIZE, SQUARE_FORMAT_FAMILY, SQUARE_FORMAT_NAME,
    ThumbnailFormat,
};

const APP_NAME: &str = "async-gallery";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Paging window configuration.
    #[serde(default)]
    pub gallery: GalleryConfig,

    /// Byte fetching configuration.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Thumbnail format configuration.
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
}

/// Paging window configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Number of neighbours on each side of the current position kept loaded.
    #[serde(default = "default_window_radius")]
    pub window_radius: usize,

    /// Drop decoded source images of records leaving the window.
    #[serde(default = "default_true")]
    pub release_source_on_purge: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            window_radius: default_window_radius(),
            release_source_on_purge: true,
        }
    }
}

/// Byte fetching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum number of concurrent transfers.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Per-request timeout. Unbounded when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// User agent sent with HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent_downloads(),
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Thumbnail format configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Format name.
    #[serde(default = "default_format_name")]
    pub name: String,

    /// Format family.
    #[serde(default = "default_format_family")]
    pub family: String,

    /// Edge length of the square thumbnail in pixels.
    #[serde(default = "default_thumbnail_size")]
    pub size: u32,

    /// Maximum number of cached thumbnails.
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

impl ThumbnailConfig {
    /// Builds the thumbnail format described by this configuration.
    #[must_use]
    pub fn to_format(&self) -> ThumbnailFormat {
        ThumbnailFormat::new(
            self.name.clone(),
            self.family.clone(),
            self.size,
            self.size,
            self.max_count,
        )
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            name: default_format_name(),
            family: default_format_family(),
            size: DEFAULT_THUMBNAIL_SIZE,
            max_count: DEFAULT_MAX_COUNT,
        }
    }
}

const fn default_window_radius() -> usize {
    1
}

const fn default_max_concurrent_downloads() -> usize {
    4
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn default_format_name() -> String {
    SQUARE_FORMAT_NAME.to_string()
}

fn default_format_family() -> String {
    SQUARE_FORMAT_FAMILY.to_string()
}

const fn default_thumbnail_size() -> u32 {
    DEFAULT_THUMBNAIL_SIZE
}

const fn default_max_count() -> usize {
    DEFAULT_MAX_COUNT
}

const fn default_true() -> bool {
    true
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(radius) = args.radius {
            self.gallery.window_radius = radius;
        }
        if args.keep_source {
            self.gallery.release_source_on_purge = false;
        }
        if let Some(max) = args.max_downloads {
            self.fetch.max_concurrent_downloads = max;
        }
        if let Some(timeout) = args.timeout_secs {
            self.fetch.timeout_secs = Some(timeout);
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("async-gallery.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}
