//! Thumbnail format definitions.

/// Family of the default square thumbnail format.
pub const SQUARE_FORMAT_FAMILY: &str = "square";

/// Name of the default square thumbnail format.
pub const SQUARE_FORMAT_NAME: &str = "square-32bit-rgba";

/// Default edge length of square thumbnails, in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 150;

/// Default maximum number of cached thumbnails per format.
pub const DEFAULT_MAX_COUNT: usize = 1000;

/// A named target format the thumbnail cache can produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailFormat {
    /// Unique format name.
    pub name: String,
    /// Family the format belongs to; eviction is scoped per family.
    pub family: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Maximum number of entries kept for this format.
    pub max_count: usize,
}

impl ThumbnailFormat {
    /// Creates a format.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        family: impl Into<String>,
        width: u32,
        height: u32,
        max_count: usize,
    ) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            width: width.max(1),
            height: height.max(1),
            max_count: max_count.max(1),
        }
    }

    /// Square format with the given edge length.
    #[must_use]
    pub fn square(size: u32) -> Self {
        Self::new(
            SQUARE_FORMAT_NAME,
            SQUARE_FORMAT_FAMILY,
            size,
            size,
            DEFAULT_MAX_COUNT,
        )
    }

    /// Sets the maximum entry count.
    #[must_use]
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count.max(1);
        self
    }
}

impl Default for ThumbnailFormat {
    fn default() -> Self {
        Self::square(DEFAULT_THUMBNAIL_SIZE)
    }
}
