pub mod gallery_coordinator;
pub mod item_sources;
pub mod paging_window;

pub use gallery_coordinator::{
    Completion, GalleryCoordinator, SelectedImage, Selection, ThumbnailLoaded,
};
pub use item_sources::{SectionedItemSource, VecItemSource};
pub use paging_window::{DEFAULT_RADIUS, PagingWindowManager, WindowPlan};
