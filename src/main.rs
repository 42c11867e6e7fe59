use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use async_gallery::application::{GalleryCoordinator, Selection, VecItemSource};
use async_gallery::domain::{GalleryEvent, ImageRecord};
use async_gallery::infrastructure::{
    AppConfig, CliArgs, HttpByteFetcher, StorageManager, ThumbnailCache,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Next,
    Prev,
    Goto(usize),
    Grid(usize, usize),
    Select,
    Status,
    Reload,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = match parts.next()? {
            "next" | "n" => Self::Next,
            "prev" | "p" => Self::Prev,
            "goto" | "g" => Self::Goto(parts.next()?.parse().ok()?),
            "grid" => Self::Grid(parts.next()?.parse().ok()?, parts.next()?.parse().ok()?),
            "select" | "s" => Self::Select,
            "status" => Self::Status,
            "reload" | "r" => Self::Reload,
            "quit" | "q" => Self::Quit,
            _ => return None,
        };
        Some(command)
    }
}

fn run_command(coordinator: &mut GalleryCoordinator, cache: &ThumbnailCache, command: Command) {
    let position = coordinator.current_position().unwrap_or(0);
    match command {
        Command::Next => {
            coordinator.on_position_changed(position.saturating_add(1));
        }
        Command::Prev => {
            coordinator.on_position_changed(position.saturating_sub(1));
        }
        Command::Goto(target) => {
            coordinator.on_position_changed(target);
        }
        Command::Grid(start, end) => coordinator.prefetch_thumbnails(start..end),
        Command::Select => match coordinator.on_selection(position) {
            Selection::Ready(selected) => println!(
                "selected {}: {}x{} ({})",
                selected.position,
                selected.image.width(),
                selected.image.height(),
                selected.record.locator()
            ),
            Selection::NotReady => println!("position {position} is not ready"),
        },
        Command::Status => {
            println!(
                "position {} of {}, {} fetches in flight, {} thumbnails pending",
                position,
                coordinator.item_count(),
                coordinator.in_flight_count(),
                coordinator.pending_thumbnail_count()
            );
            for p in coordinator.active_positions() {
                if let Some(record) = coordinator.current_record(p) {
                    println!("  {}", status_line(p, &record));
                }
            }
            println!("  {}", cache.stats());
        }
        Command::Reload => {
            coordinator.reload(position);
        }
        Command::Quit => {}
    }
}

fn status_line(position: usize, record: &ImageRecord) -> String {
    let snapshot = record.snapshot();
    let busy = if snapshot.state.shows_activity() { "*" } else { " " };
    format!(
        "{busy}[{position}] {} thumbnail={} {}",
        snapshot.state,
        snapshot.thumbnail.is_some(),
        record.locator()
    )
}

fn print_event(event: &GalleryEvent) {
    match event {
        GalleryEvent::RecordStateChanged { identity, old, new } => {
            println!("{identity}: {old} -> {new}");
        }
        GalleryEvent::ThumbnailReady { position } => println!("thumbnail ready at {position}"),
        GalleryEvent::ThumbnailFailed { position, error } => {
            println!("thumbnail failed at {position}: {error}");
        }
        GalleryEvent::SelectionAvailable { position, image } => {
            println!("selection at {position}: {}x{}", image.width(), image.height());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = async_gallery::VERSION, "Starting {}", async_gallery::NAME);

    if args.locators.is_empty() {
        return Err(eyre!("no image locators given"));
    }

    let fetcher = Arc::new(HttpByteFetcher::new(config.fetch.clone())?);
    let cache = ThumbnailCache::new(fetcher.clone(), vec![config.thumbnail.to_format()]);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let mut coordinator = GalleryCoordinator::new(
        config.gallery.clone(),
        Arc::new(cache.clone()),
        fetcher,
        events_tx,
    )
    .with_thumbnail_format(config.thumbnail.name.clone());
    coordinator.set_item_source(Arc::new(VecItemSource::new(args.locators.clone())));
    coordinator.on_position_changed(args.start);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Some(Command::Quit) => break,
                    Some(command) => run_command(&mut coordinator, &cache, command),
                    None if line.trim().is_empty() => {}
                    None => println!("unknown command: {}", line.trim()),
                }
            }
            Some(completion) = coordinator.next_completion() => {
                coordinator.apply_completion(completion);
            }
            Some(event) = events_rx.recv() => print_event(&event),
        }
    }

    info!("Shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_gallery::domain::entities::LoadInput;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("next"), Some(Command::Next));
        assert_eq!(Command::parse("  g 12 "), Some(Command::Goto(12)));
        assert_eq!(Command::parse("grid 0 30"), Some(Command::Grid(0, 30)));
        assert_eq!(Command::parse("goto"), None);
        assert_eq!(Command::parse("goto x"), None);
        assert_eq!(Command::parse("dance"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_status_line_marks_busy_records() {
        let record = ImageRecord::new("https://example.com/a.png");
        assert!(status_line(0, &record).starts_with(" [0] "));

        assert!(record.apply(LoadInput::Start).is_some());
        let line = status_line(3, &record);
        assert!(line.starts_with("*[3] "));
        assert!(line.ends_with("https://example.com/a.png"));
    }
}
