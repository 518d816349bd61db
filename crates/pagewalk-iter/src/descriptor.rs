//! Query descriptor composed into store-native queries.

use pagewalk_core::{Comparison, Direction, Entity, Predicate, SortKey, StoreQuery};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable description of the filters and ordering of an iteration.
///
/// Predicates are ANDed in the order given; sort keys apply in the order given
/// with the first key primary. Conflicting or redundant predicates are passed
/// through untouched and left to the store.
///
/// # Id tiebreak
///
/// Resuming strictly after an entity is only exact when the sort order is
/// total. Unless disabled with [`without_id_tiebreak`](Self::without_id_tiebreak),
/// the descriptor appends `id ASC` to its sort keys (when they do not already
/// include `id`), so entities sharing a sort value are neither skipped nor
/// repeated across page boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    #[serde(default)]
    predicates: Vec<Predicate>,
    #[serde(default)]
    sort: Vec<SortKey>,
    #[serde(default = "default_id_tiebreak")]
    id_tiebreak: bool,
}

fn default_id_tiebreak() -> bool {
    true
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            sort: Vec::new(),
            id_tiebreak: default_id_tiebreak(),
        }
    }
}

impl QueryDescriptor {
    /// Creates a descriptor matching every entity in store order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter predicate.
    pub fn filter(mut self, field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::new(field, op, value));
        self
    }

    /// Adds an equality filter.
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, Comparison::Eq, value)
    }

    /// Appends pre-built predicates.
    pub fn with_predicates(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Adds a sort key.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.sort.push(SortKey::new(field, direction));
        self
    }

    /// Appends pre-built sort keys.
    pub fn with_sort(mut self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.sort.extend(keys);
        self
    }

    /// Disables the implicit `id` tiebreak.
    ///
    /// With a non-unique sort, entities that tie with a page's last entity on
    /// every sort key are skipped by the next page.
    pub fn without_id_tiebreak(mut self) -> Self {
        self.id_tiebreak = false;
        self
    }

    /// Returns the filter predicates in application order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the caller-supplied sort keys.
    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    /// Returns whether the implicit `id` tiebreak is enabled.
    pub fn id_tiebreak(&self) -> bool {
        self.id_tiebreak
    }

    /// Returns the sort keys actually sent to the store.
    pub fn effective_sort(&self) -> Vec<SortKey> {
        let mut sort = self.sort.clone();
        let has_id = sort.iter().any(|key| key.field == Entity::ID_FIELD);
        if self.id_tiebreak && !has_id {
            sort.push(SortKey::asc(Entity::ID_FIELD));
        }
        sort
    }

    /// Composes the store-native query for one page.
    pub fn to_store_query(&self, limit: usize, start_after: Option<Entity>) -> StoreQuery {
        StoreQuery {
            predicates: self.predicates.clone(),
            sort: self.effective_sort(),
            limit: Some(limit),
            start_after,
        }
    }
}
