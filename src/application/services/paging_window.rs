//! Load window computation.

use std::ops::RangeInclusive;

/// Default number of neighbours kept loaded on each side.
pub const DEFAULT_RADIUS: usize = 1;

/// Load and purge decision for one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlan {
    /// Clamped current position.
    pub position: usize,
    /// Total number of positions.
    pub count: usize,
    /// In-window positions, nearest to `position` first.
    pub load: Vec<usize>,
    range: Option<RangeInclusive<usize>>,
}

impl WindowPlan {
    /// Returns true if `position` is inside the load window.
    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        self.range.as_ref().is_some_and(|r| r.contains(&position))
    }

    /// Returns the load window as an inclusive range.
    #[must_use]
    pub fn load_range(&self) -> Option<RangeInclusive<usize>> {
        self.range.clone()
    }

    /// Positions outside the load window, ascending.
    pub fn purge(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).filter(|p| !self.contains(*p))
    }
}

/// Computes which positions to load and which to purge.
///
/// Stateless apart from the radius; safe to call on every scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingWindowManager {
    radius: usize,
}

impl PagingWindowManager {
    /// Creates a manager with the given radius.
    #[must_use]
    pub const fn new(radius: usize) -> Self {
        Self { radius }
    }

    /// Returns the radius.
    #[must_use]
    pub const fn radius(&self) -> usize {
        self.radius
    }

    /// Returns the in-window range around `position`, clamped to `count`.
    #[must_use]
    pub fn load_range(&self, position: usize, count: usize) -> Option<RangeInclusive<usize>> {
        let last = count.checked_sub(1)?;
        let center = position.min(last);
        Some(center.saturating_sub(self.radius)..=center.saturating_add(self.radius).min(last))
    }

    /// Plans the load window for `position` among `count` positions.
    ///
    /// Ties in distance go to the lower position.
    #[must_use]
    pub fn plan(&self, position: usize, count: usize) -> WindowPlan {
        let range = self.load_range(position, count);
        let center = position.min(count.saturating_sub(1));

        let mut load: Vec<usize> = range.clone().map(Iterator::collect).unwrap_or_default();
        load.sort_by_key(|&p| (p.abs_diff(center), p));

        WindowPlan {
            position: center,
            count,
            load,
            range,
        }
    }
}

impl Default for PagingWindowManager {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS)
    }
}
