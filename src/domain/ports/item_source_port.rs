//! Port definition for the external item provider.

/// Provides the ordered list of gallery items.
#[cfg_attr(test, mockall::automock)]
pub trait ItemSource: Send + Sync {
    /// Number of items.
    fn count(&self) -> usize;

    /// Locator of the item at `position`, or `None` when out of range.
    fn locator_for_position(&self, position: usize) -> Option<String>;
}
