//! Application layer with the gallery coordinator and its services.

/// Coordinator, paging window and item sources.
pub mod services;

pub use services::{
    Completion, GalleryCoordinator, PagingWindowManager, SectionedItemSource, SelectedImage,
    Selection, VecItemSource, WindowPlan,
};
