//! Entity record stored in a document collection.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A uniquely identified record in a document collection.
///
/// The three system attributes are managed by the CRUD layer: `id` is
/// immutable, `created_at` is set once, and `updated_at` is refreshed on every
/// write. Everything else lives in `fields` and is opaque to the iteration core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique identifier, also used as the pagination cursor.
    pub id: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last write time.
    pub updated_at: Timestamp,
    /// Caller-defined attributes.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Name of the id attribute as seen by queries.
    pub const ID_FIELD: &'static str = "id";
    /// Name of the creation time attribute as seen by queries.
    pub const CREATED_AT_FIELD: &'static str = "createdAt";
    /// Name of the last write time attribute as seen by queries.
    pub const UPDATED_AT_FIELD: &'static str = "updatedAt";

    /// Creates an entity with both timestamps set to `now`.
    pub fn new(id: impl Into<String>, fields: Map<String, Value>, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            fields,
        }
    }

    /// Returns whether `field` names one of the system attributes.
    pub fn is_system_field(field: &str) -> bool {
        matches!(
            field,
            Self::ID_FIELD | Self::CREATED_AT_FIELD | Self::UPDATED_AT_FIELD
        )
    }

    /// Looks up a caller-defined attribute by dotted path (`address.city`).
    ///
    /// System attributes are not part of `fields`; use the struct members for those.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Sets a caller-defined attribute, returning the previous value.
    ///
    /// System attribute names are ignored and yield `None`.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let field = field.into();
        if Self::is_system_field(&field) {
            return None;
        }
        self.fields.insert(field, value.into())
    }

    /// Shallow-merges `patch` into the caller-defined attributes.
    ///
    /// `null` values remove the attribute. System attribute names are ignored.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            if Self::is_system_field(&key) {
                continue;
            }
            if value.is_null() {
                self.fields.remove(&key);
            } else {
                self.fields.insert(key, value);
            }
        }
    }

    /// Marks the entity as written at `now`.
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}
