//! In-memory item sources.

use crate::domain::entities::IndexPath;
use crate::domain::ports::ItemSource;

/// A flat list of locators.
#[derive(Debug, Clone, Default)]
pub struct VecItemSource {
    locators: Vec<String>,
}

impl VecItemSource {
    /// Creates a source over the given locators.
    #[must_use]
    pub fn new<I, S>(locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locators: locators.into_iter().map(Into::into).collect(),
        }
    }
}

impl ItemSource for VecItemSource {
    fn count(&self) -> usize {
        self.locators.len()
    }

    fn locator_for_position(&self, position: usize) -> Option<String> {
        self.locators.get(position).cloned()
    }
}

/// Sections of locators paged as one continuous sequence.
///
/// A grid addresses items by section and item, the pager by page number.
#[derive(Debug, Clone, Default)]
pub struct SectionedItemSource {
    sections: Vec<Vec<String>>,
    offsets: Vec<usize>,
    total: usize,
}

impl SectionedItemSource {
    /// Creates a source from sections in display order.
    #[must_use]
    pub fn new(sections: Vec<Vec<String>>) -> Self {
        let mut offsets = Vec::with_capacity(sections.len());
        let mut total = 0;
        for section in &sections {
            offsets.push(total);
            total += section.len();
        }
        Self {
            sections,
            offsets,
            total,
        }
    }

    /// Number of sections.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Maps a page number to its section and item.
    #[must_use]
    pub fn index_path_for_page(&self, page: usize) -> Option<IndexPath> {
        if page >= self.total {
            return None;
        }
        // Empty sections share their offset with the next one; take the last match.
        let section = self.offsets.partition_point(|&offset| offset <= page) - 1;
        Some(IndexPath::new(section, page - self.offsets[section]))
    }

    /// Maps a section and item to its page number.
    #[must_use]
    pub fn page_for_index_path(&self, path: &IndexPath) -> Option<usize> {
        let section = self.sections.get(path.section)?;
        (path.item < section.len()).then(|| self.offsets[path.section] + path.item)
    }
}

impl ItemSource for SectionedItemSource {
    fn count(&self) -> usize {
        self.total
    }

    fn locator_for_position(&self, position: usize) -> Option<String> {
        let path = self.index_path_for_page(position)?;
        self.sections[path.section].get(path.item).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections() -> SectionedItemSource {
        SectionedItemSource::new(vec![
            vec!["a".into(), "b".into()],
            vec![],
            vec!["c".into(), "d".into(), "e".into()],
        ])
    }

    #[test]
    fn test_vec_source() {
        let source = VecItemSource::new(["x.png", "y.png"]);
        assert_eq!(source.count(), 2);
        assert_eq!(source.locator_for_position(1).as_deref(), Some("y.png"));
        assert!(source.locator_for_position(2).is_none());
    }

    #[test]
    fn test_pages_span_sections() {
        let source = sections();
        assert_eq!(source.count(), 5);
        assert_eq!(source.section_count(), 3);
        assert_eq!(source.index_path_for_page(1), Some(IndexPath::new(0, 1)));
        assert_eq!(source.index_path_for_page(2), Some(IndexPath::new(2, 0)));
        assert_eq!(source.index_path_for_page(4), Some(IndexPath::new(2, 2)));
        assert_eq!(source.index_path_for_page(5), None);
        assert_eq!(source.locator_for_position(3).as_deref(), Some("d"));
    }

    #[test]
    fn test_index_path_round_trip() {
        let source = sections();
        for page in 0..source.count() {
            let path = source.index_path_for_page(page).unwrap();
            assert_eq!(source.page_for_index_path(&path), Some(page));
        }
        assert_eq!(source.page_for_index_path(&IndexPath::new(1, 0)), None);
        assert_eq!(source.page_for_index_path(&IndexPath::new(7, 0)), None);
    }
}
