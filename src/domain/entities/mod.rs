//! Domain entity definitions.

mod image;
mod image_record;
mod index_path;
mod load_state;
mod thumbnail_format;

pub use image::{ImageId, Locator, LocatorScheme};
pub use image_record::{ImageRecord, RecordSnapshot};
pub use index_path::IndexPath;
pub use load_state::{LoadInput, LoadState, StateChange};
pub use thumbnail_format::{
    DEFAULT_MAX_COUNT, DEFAULT_THUMBNAIL_SIZE, SQUARE_FORMAT_FAMILY, SQUARE_FORMAT_NAME,
    ThumbnailFormat,
};
