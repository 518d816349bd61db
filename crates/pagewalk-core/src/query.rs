//! Store-native query primitives.
//!
//! A [`StoreQuery`] is what a [`DocumentStore`] executes: an ordered list of
//! ANDed [`Predicate`]s, an ordered list of [`SortKey`]s (first key primary),
//! an optional limit and an optional start-after position marker.
//!
//! [`DocumentStore`]: crate::DocumentStore

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::Entity;

/// Comparison operator of a filter predicate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Comparison {
    /// Field equals the value.
    #[strum(to_string = "eq", serialize = "==")]
    Eq,
    /// Field differs from the value.
    #[strum(to_string = "ne", serialize = "!=")]
    Ne,
    /// Field is strictly less than the value.
    #[strum(to_string = "lt", serialize = "<")]
    Lt,
    /// Field is less than or equal to the value.
    #[strum(to_string = "le", serialize = "<=")]
    Le,
    /// Field is strictly greater than the value.
    #[strum(to_string = "gt", serialize = ">")]
    Gt,
    /// Field is greater than or equal to the value.
    #[strum(to_string = "ge", serialize = ">=")]
    Ge,
    /// Field equals one of the values of an array.
    In,
    /// Field equals none of the values of an array.
    NotIn,
    /// Array field contains the value.
    ArrayContains,
    /// Array field contains at least one of the values of an array.
    ArrayContainsAny,
}

/// Sort direction of a sort key.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Direction {
    /// Ascending order (default).
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// A single `(field, operator, value)` filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Field path, system attribute name or dotted path into caller fields.
    pub field: String,
    /// Comparison operator.
    pub op: Comparison,
    /// Right-hand side of the comparison.
    pub value: Value,
}

impl Predicate {
    /// Creates a new predicate.
    pub fn new(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Creates an equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Comparison::Eq, value)
    }
}

/// A single `(field, direction)` ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Field path to order by.
    pub field: String,
    /// Sort direction.
    #[serde(default)]
    pub direction: Direction,
}

impl SortKey {
    /// Creates a new sort key.
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Creates an ascending sort key.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Asc)
    }

    /// Creates a descending sort key.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Desc)
    }
}

/// Query as executed by a document store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    /// Filters, ANDed together in order.
    pub predicates: Vec<Predicate>,
    /// Orderings, first key primary.
    pub sort: Vec<SortKey>,
    /// Maximum number of entities to return.
    pub limit: Option<usize>,
    /// Snapshot of the entity to start strictly after.
    pub start_after: Option<Entity>,
}

impl StoreQuery {
    /// Creates an unfiltered, unsorted, unlimited query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter predicate.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Adds a sort key.
    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Sets the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the start-after position marker.
    pub fn with_start_after(mut self, marker: Entity) -> Self {
        self.start_after = Some(marker);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn comparison_parses_names_and_symbols() {
        assert_eq!(Comparison::from_str("eq").unwrap(), Comparison::Eq);
        assert_eq!(Comparison::from_str("==").unwrap(), Comparison::Eq);
        assert_eq!(Comparison::from_str(">=").unwrap(), Comparison::Ge);
        assert_eq!(
            Comparison::from_str("array_contains").unwrap(),
            Comparison::ArrayContains
        );
        assert_eq!(Comparison::from_str("NOT_IN").unwrap(), Comparison::NotIn);
        assert!(Comparison::from_str("like").is_err());
    }

    #[test]
    fn direction_defaults_to_ascending() {
        assert_eq!(Direction::default(), Direction::Asc);
        assert_eq!(Direction::from_str("DESC").unwrap(), Direction::Desc);
        assert_eq!(Direction::Desc.to_string(), "desc");
    }

    #[test]
    fn store_query_accumulates_in_order() {
        let query = StoreQuery::new()
            .with_predicate(Predicate::eq("a", 1))
            .with_predicate(Predicate::new("b", Comparison::Gt, 2))
            .with_sort(SortKey::desc("b"))
            .with_sort(SortKey::asc("id"))
            .with_limit(10);

        assert_eq!(query.predicates[0].field, "a");
        assert_eq!(query.predicates[1].op, Comparison::Gt);
        assert_eq!(query.sort[0], SortKey::desc("b"));
        assert_eq!(query.sort[1], SortKey::asc("id"));
        assert_eq!(query.limit, Some(10));
        assert!(query.start_after.is_none());
    }
}
