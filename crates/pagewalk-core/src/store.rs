//! Document store abstraction.

use jiff::Timestamp;

use crate::{Entity, Result, StoreQuery};

/// Maximum number of entities a store accepts in one batched write.
pub const MAX_BATCH_SIZE: usize = 500;

/// Async seam to a remote document store.
///
/// Implementations execute the store-native query shape and batched writes.
/// Nothing above this trait knows how records are persisted or transported.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Executes a query and returns the matching entities in query order.
    ///
    /// When `query.start_after` is set, results start strictly after that
    /// entity's position in the established sort order.
    async fn query(&self, query: &StoreQuery) -> Result<Vec<Entity>>;

    /// Fetches a single entity by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<Entity>>;

    /// Inserts a group of new entities.
    ///
    /// The group is applied atomically; any existing id fails the whole group.
    async fn create_batch(&self, entities: Vec<Entity>) -> Result<()>;

    /// Replaces a group of existing entities.
    ///
    /// The group is applied atomically; any missing id fails the whole group.
    async fn update_batch(&self, entities: Vec<Entity>) -> Result<()>;

    /// Removes a group of entities by id. Missing ids are ignored.
    async fn delete_batch(&self, ids: Vec<String>) -> Result<()>;

    /// Replaces `entity` only if the stored copy was last written at `expected_updated_at`.
    ///
    /// Returns `false` when the precondition does not hold.
    async fn update_if_unchanged(
        &self,
        entity: Entity,
        expected_updated_at: Timestamp,
    ) -> Result<bool>;

    /// Largest group accepted by the batched write calls.
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }
}
