use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "async-gallery",
    version,
    about = "Headless pager over an asynchronously loaded image gallery",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Number of neighbours kept loaded on each side.
    #[arg(short, long)]
    pub radius: Option<usize>,

    /// Initial position.
    #[arg(short, long, default_value_t = 0)]
    pub start: usize,

    /// Keep decoded source images when they leave the window.
    #[arg(long)]
    pub keep_source: bool,

    /// Maximum number of concurrent transfers.
    #[arg(long, env = "ASYNC_GALLERY_MAX_DOWNLOADS")]
    pub max_downloads: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Image URLs or file paths, in display order.
    #[arg(value_name = "LOCATOR")]
    pub locators: Vec<String>,
}
