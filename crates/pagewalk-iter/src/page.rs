//! One bounded slice of a result set.

use derive_more::{Deref, IntoIterator};
use pagewalk_core::Entity;

/// Ordered entities returned by a single fetch.
///
/// A page never holds more entities than the page size it was fetched with.
/// A page shorter than that size is the only signal that the result set is
/// exhausted.
#[derive(Debug, Clone, Default, PartialEq, Deref, IntoIterator)]
pub struct Page {
    #[deref]
    #[into_iterator(owned, ref)]
    entities: Vec<Entity>,
    next_cursor: Option<String>,
}

impl Page {
    /// Creates a page and derives its next cursor from the last entity.
    pub fn new(entities: Vec<Entity>) -> Self {
        let next_cursor = entities.last().map(|entity| entity.id.clone());
        Self {
            entities,
            next_cursor,
        }
    }

    /// Cursor to resume strictly after this page, `None` for an empty page.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    /// Returns whether this page is shorter than `page_size`.
    pub fn is_short(&self, page_size: usize) -> bool {
        self.entities.len() < page_size
    }

    /// Returns the entities as a slice.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Consumes the page and returns its entities.
    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }
}
