//! In-process document store.
//!
//! [`MemoryStore`] evaluates the full [`StoreQuery`] shape against a sorted map
//! of entities. It mirrors the semantics of hosted document stores closely
//! enough to exercise pagination end to end:
//!
//! - a predicate on a missing field never matches, including `ne` and `not_in`;
//! - range comparisons only match values of the same type;
//! - values of different types order as null < bool < number < timestamp < string < array < object;
//! - without sort keys, results are ordered by id;
//! - `start_after` keeps entities whose sort tuple is strictly greater than the marker's,
//!   so entities that tie with the marker on every sort key are skipped.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use jiff::Timestamp;
use serde_json::{Number, Value};
use tokio::sync::RwLock;

use crate::query::{Comparison, Direction, Predicate, SortKey, StoreQuery};
use crate::{DocumentStore, Entity, Error, Result, TRACING_TARGET_STORE};

/// Document store backed by an in-memory ordered map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<BTreeMap<String, Entity>>,
    max_batch_size: Option<usize>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entities`. Later duplicates replace earlier ones.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let entities = entities
            .into_iter()
            .map(|entity| (entity.id.clone(), entity))
            .collect();

        Self {
            entities: RwLock::new(entities),
            max_batch_size: None,
        }
    }

    /// Overrides the largest accepted write group.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size.max(1));
        self
    }

    /// Returns the number of stored entities.
    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    /// Returns whether the store holds no entities.
    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }

    fn check_group(&self, len: usize) -> Result<()> {
        let max = self.max_batch_size();
        if len > max {
            return Err(Error::invalid_input(format!(
                "batch of {len} entities exceeds the maximum group size of {max}"
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    #[tracing::instrument(skip_all, target = TRACING_TARGET_STORE)]
    async fn query(&self, query: &StoreQuery) -> Result<Vec<Entity>> {
        let entities = self.entities.read().await;

        let mut matched: Vec<&Entity> = entities
            .values()
            .filter(|entity| query.predicates.iter().all(|p| matches(entity, p)))
            .collect();

        // Stable sort: ties keep id order from the map.
        matched.sort_by(|a, b| compare_entities(a, b, &query.sort));

        if let Some(marker) = &query.start_after {
            matched.retain(|entity| compare_entities(entity, marker, &query.sort).is_gt());
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        let results: Vec<Entity> = matched.into_iter().take(limit).cloned().collect();

        tracing::trace!(
            target: TRACING_TARGET_STORE,
            predicates = query.predicates.len(),
            sort_keys = query.sort.len(),
            limit = ?query.limit,
            start_after = query.start_after.as_ref().map(|e| e.id.as_str()),
            returned = results.len(),
            "Executed query"
        );

        Ok(results)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.entities.read().await.get(id).cloned())
    }

    async fn create_batch(&self, batch: Vec<Entity>) -> Result<()> {
        self.check_group(batch.len())?;
        let mut entities = self.entities.write().await;

        if let Some(existing) = batch.iter().find(|e| entities.contains_key(&e.id)) {
            return Err(Error::already_exists(existing.id.clone()));
        }
        for entity in batch {
            entities.insert(entity.id.clone(), entity);
        }
        Ok(())
    }

    async fn update_batch(&self, batch: Vec<Entity>) -> Result<()> {
        self.check_group(batch.len())?;
        let mut entities = self.entities.write().await;

        if let Some(missing) = batch.iter().find(|e| !entities.contains_key(&e.id)) {
            return Err(Error::not_found(missing.id.clone()));
        }
        for entity in batch {
            entities.insert(entity.id.clone(), entity);
        }
        Ok(())
    }

    async fn delete_batch(&self, ids: Vec<String>) -> Result<()> {
        self.check_group(ids.len())?;
        let mut entities = self.entities.write().await;
        for id in ids {
            entities.remove(&id);
        }
        Ok(())
    }

    async fn update_if_unchanged(
        &self,
        entity: Entity,
        expected_updated_at: Timestamp,
    ) -> Result<bool> {
        let mut entities = self.entities.write().await;
        let Some(current) = entities.get_mut(&entity.id) else {
            return Err(Error::not_found(entity.id));
        };

        if current.updated_at != expected_updated_at {
            return Ok(false);
        }
        *current = entity;
        Ok(true)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size.unwrap_or(crate::MAX_BATCH_SIZE)
    }
}

/// Comparable view of a field value.
#[derive(Debug, Clone)]
enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    Time(Timestamp),
    String(String),
    Array(Vec<Scalar>),
    Object(String),
}

impl Scalar {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => Self::Object(value.to_string()),
        }
    }

    /// Converts a predicate operand, reading strings as timestamps when compared to one.
    fn operand(value: &Value, like: &Scalar) -> Self {
        if let (Scalar::Time(_), Value::String(s)) = (like, value)
            && let Ok(ts) = s.parse::<Timestamp>()
        {
            return Self::Time(ts);
        }
        Self::from_json(value)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::Time(_) => 3,
            Self::String(_) => 4,
            Self::Array(_) => 5,
            Self::Object(_) => 6,
        }
    }

    fn same_type(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => compare_numbers(a, b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.total_cmp(y);
                    if ord.is_ne() {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Object(a), Self::Object(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn equals(&self, other: &Self) -> bool {
        self.total_cmp(other).is_eq()
    }
}

/// Orders two JSON numbers, exactly when both are integers.
fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a.cmp(&b);
    }
    // One side is a negative i64 and the other a u64 above i64::MAX.
    if a.is_i64() && b.is_u64() {
        return Ordering::Less;
    }
    if a.is_u64() && b.is_i64() {
        return Ordering::Greater;
    }

    let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn resolve(entity: &Entity, field: &str) -> Option<Scalar> {
    match field {
        Entity::ID_FIELD => Some(Scalar::String(entity.id.clone())),
        Entity::CREATED_AT_FIELD => Some(Scalar::Time(entity.created_at)),
        Entity::UPDATED_AT_FIELD => Some(Scalar::Time(entity.updated_at)),
        path => entity.field(path).map(Scalar::from_json),
    }
}

fn matches(entity: &Entity, predicate: &Predicate) -> bool {
    let Some(field) = resolve(entity, &predicate.field) else {
        return false;
    };
    let operand = Scalar::operand(&predicate.value, &field);

    match predicate.op {
        Comparison::Eq => field.equals(&operand),
        Comparison::Ne => !field.equals(&operand),
        Comparison::Lt => field.same_type(&operand) && field.total_cmp(&operand).is_lt(),
        Comparison::Le => field.same_type(&operand) && field.total_cmp(&operand).is_le(),
        Comparison::Gt => field.same_type(&operand) && field.total_cmp(&operand).is_gt(),
        Comparison::Ge => field.same_type(&operand) && field.total_cmp(&operand).is_ge(),
        Comparison::In => candidates(&predicate.value, &field)
            .iter()
            .any(|c| field.equals(c)),
        Comparison::NotIn => !candidates(&predicate.value, &field)
            .iter()
            .any(|c| field.equals(c)),
        Comparison::ArrayContains => match &field {
            Scalar::Array(items) => items.iter().any(|item| item.equals(&operand)),
            _ => false,
        },
        Comparison::ArrayContainsAny => match &field {
            Scalar::Array(items) => candidates(&predicate.value, &field)
                .iter()
                .any(|c| items.iter().any(|item| item.equals(c))),
            _ => false,
        },
    }
}

/// Expands an array operand; a scalar operand is treated as a one-element list.
fn candidates(value: &Value, like: &Scalar) -> Vec<Scalar> {
    match value {
        Value::Array(items) => items.iter().map(|v| Scalar::operand(v, like)).collect(),
        other => vec![Scalar::operand(other, like)],
    }
}

fn compare_entities(a: &Entity, b: &Entity, sort: &[SortKey]) -> Ordering {
    if sort.is_empty() {
        return a.id.cmp(&b.id);
    }

    for key in sort {
        let left = resolve(a, &key.field).unwrap_or(Scalar::Null);
        let right = resolve(b, &key.field).unwrap_or(Scalar::Null);
        let ord = match key.direction {
            Direction::Asc => left.total_cmp(&right),
            Direction::Desc => right.total_cmp(&left),
        };
        if ord.is_ne() {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::*;

    fn entity(id: &str, fields: Value) -> Entity {
        let Value::Object(map) = fields else {
            panic!("fields must be an object");
        };
        Entity::new(id, map, Timestamp::UNIX_EPOCH)
    }

    fn ids(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.id.as_str()).collect()
    }

    fn fixture() -> MemoryStore {
        MemoryStore::from_entities([
            entity("a", json!({ "n": 3, "tags": ["x", "y"], "kind": "fruit" })),
            entity("b", json!({ "n": 1, "tags": ["y"], "kind": "veg" })),
            entity("c", json!({ "n": 2, "kind": "fruit" })),
            entity("d", json!({ "n": "two", "kind": "fruit" })),
        ])
    }

    #[tokio::test]
    async fn unsorted_query_orders_by_id() {
        let store = fixture();
        let results = store.query(&StoreQuery::new()).await.unwrap();
        assert_eq!(ids(&results), ["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn predicates_are_anded() {
        let store = fixture();
        let query = StoreQuery::new()
            .with_predicate(Predicate::eq("kind", "fruit"))
            .with_predicate(Predicate::new("n", Comparison::Ge, 2));

        let results = store.query(&query).await.unwrap();
        assert_eq!(ids(&results), ["a", "c"]);
    }

    #[tokio::test]
    async fn range_predicates_ignore_other_types() {
        let store = fixture();
        let query = StoreQuery::new().with_predicate(Predicate::new("n", Comparison::Lt, 10));

        let results = store.query(&query).await.unwrap();
        assert_eq!(ids(&results), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn large_integers_compare_exactly() {
        let store = MemoryStore::from_entities(vec![
            entity("a", json!({ "n": 9_007_199_254_740_992_u64 })),
            entity("b", json!({ "n": 9_007_199_254_740_993_u64 })),
            entity("c", json!({ "n": u64::MAX })),
            entity("d", json!({ "n": -1 })),
            entity("e", json!({ "n": 1.5 })),
        ]);

        let query = StoreQuery::new().with_predicate(Predicate::eq("n", 9_007_199_254_740_993_u64));
        let results = store.query(&query).await.unwrap();
        assert_eq!(ids(&results), ["b"]);

        let query = StoreQuery::new().with_predicate(Predicate::new(
            "n",
            Comparison::In,
            json!([9_007_199_254_740_992_u64, -1]),
        ));
        let results = store.query(&query).await.unwrap();
        assert_eq!(ids(&results), ["a", "d"]);

        let query = StoreQuery::new().with_predicate(Predicate::new(
            "n",
            Comparison::Gt,
            9_007_199_254_740_992_u64,
        ));
        let results = store.query(&query).await.unwrap();
        assert_eq!(ids(&results), ["b", "c"]);

        let query = StoreQuery::new().with_sort(SortKey::desc("n"));
        let results = store.query(&query).await.unwrap();
        assert_eq!(ids(&results), ["c", "b", "a", "e", "d"]);
    }

    #[tokio::test]
    async fn missing_fields_never_match() {
        let store = fixture();
        let query =
            StoreQuery::new().with_predicate(Predicate::new("tags", Comparison::Ne, json!([])));

        let results = store.query(&query).await.unwrap();
        assert_eq!(ids(&results), ["a", "b"]);
    }

    #[tokio::test]
    async fn membership_and_array_operators() {
        let store = fixture();

        let query = StoreQuery::new().with_predicate(Predicate::new(
            "kind",
            Comparison::In,
            json!(["veg", "meat"]),
        ));
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["b"]);

        let query = StoreQuery::new().with_predicate(Predicate::new(
            "kind",
            Comparison::NotIn,
            json!(["veg"]),
        ));
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["a", "c", "d"]);

        let query =
            StoreQuery::new().with_predicate(Predicate::new("tags", Comparison::ArrayContains, "x"));
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["a"]);

        let query = StoreQuery::new().with_predicate(Predicate::new(
            "tags",
            Comparison::ArrayContainsAny,
            json!(["y", "z"]),
        ));
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["a", "b"]);
    }

    #[tokio::test]
    async fn sort_and_start_after() {
        let store = fixture();
        let query = StoreQuery::new()
            .with_predicate(Predicate::new("n", Comparison::Ge, 0))
            .with_sort(SortKey::desc("n"));
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["a", "c", "b"]);

        let marker = store.get_by_id("c").await.unwrap().unwrap();
        let query = query.with_start_after(marker).with_limit(5);
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["b"]);
    }

    #[tokio::test]
    async fn start_after_skips_ties_without_unique_key() {
        let store = MemoryStore::from_entities([
            entity("a", json!({ "group": 1 })),
            entity("b", json!({ "group": 1 })),
            entity("c", json!({ "group": 2 })),
        ]);
        let marker = store.get_by_id("a").await.unwrap().unwrap();

        let query = StoreQuery::new()
            .with_sort(SortKey::asc("group"))
            .with_start_after(marker.clone());
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["c"]);

        let query = StoreQuery::new()
            .with_sort(SortKey::asc("group"))
            .with_sort(SortKey::asc("id"))
            .with_start_after(marker);
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["b", "c"]);
    }

    #[tokio::test]
    async fn timestamp_fields_compare_against_strings() {
        let early = Timestamp::from_second(1_000).unwrap();
        let late = Timestamp::from_second(2_000).unwrap();
        let store = MemoryStore::from_entities([
            Entity::new("old", Map::new(), early),
            Entity::new("new", Map::new(), late),
        ]);

        let query = StoreQuery::new().with_predicate(Predicate::new(
            "createdAt",
            Comparison::Gt,
            Timestamp::from_second(1_500).unwrap().to_string(),
        ));
        assert_eq!(ids(&store.query(&query).await.unwrap()), ["new"]);
    }

    #[tokio::test]
    async fn batched_writes() {
        let store = MemoryStore::new().with_max_batch_size(2);
        store
            .create_batch(vec![entity("a", json!({})), entity("b", json!({}))])
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);

        let err = store
            .create_batch(vec![entity("c", json!({})), entity("a", json!({}))])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { id } if id == "a"));
        assert_eq!(store.len().await, 2);

        let err = store
            .create_batch(vec![
                entity("x", json!({})),
                entity("y", json!({})),
                entity("z", json!({})),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let err = store
            .update_batch(vec![entity("missing", json!({}))])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        store
            .delete_batch(vec!["a".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn conditional_update_checks_write_time() {
        let store = MemoryStore::from_entities([entity("a", json!({ "v": 1 }))]);

        let mut next = entity("a", json!({ "v": 2 }));
        next.touch(Timestamp::from_second(10).unwrap());

        let stale = Timestamp::from_second(5).unwrap();
        assert!(!store.update_if_unchanged(next.clone(), stale).await.unwrap());
        assert!(
            store
                .update_if_unchanged(next, Timestamp::UNIX_EPOCH)
                .await
                .unwrap()
        );

        let stored = store.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.field("v"), Some(&json!(2)));
    }
}
