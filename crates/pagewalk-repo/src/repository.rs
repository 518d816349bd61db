//! CRUD operations over a document store.

use std::sync::Arc;

use jiff::{SignedDuration, Timestamp};
use pagewalk_core::{DocumentStore, Entity, NoopHook, Operation, SharedHook};
use pagewalk_iter::EntityPager;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::batch::write_groups;
use crate::{Error, Result, RetryConfig, TRACING_TARGET_REPOSITORY};

/// Caller-supplied content of an entity to create.
///
/// Deserializes from a flat JSON object; an `id` key picks the id, any other
/// system attribute is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    /// Explicit id; a UUID v7 is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Caller-defined attributes.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NewEntity {
    /// Creates a draft with a generated id.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { id: None, fields }
    }

    /// Uses `id` instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn into_entity(self, now: Timestamp) -> pagewalk_core::Result<Entity> {
        let id = match self.id {
            Some(id) if id.is_empty() => {
                return Err(pagewalk_core::Error::invalid_input("entity id must not be empty"));
            }
            Some(id) => id,
            None => Uuid::now_v7().to_string(),
        };

        let mut entity = Entity::new(id, Map::new(), now);
        entity.merge(self.fields);
        Ok(entity)
    }
}

/// Repository of entities stored in one collection.
///
/// Ids are UUID v7 strings, so id order follows creation order. Every store
/// call is reported to the accounting hook, which is shared with the pager
/// returned by [`pager`](Self::pager).
pub struct Repository<S: ?Sized> {
    store: Arc<S>,
    hook: SharedHook,
    retry: RetryConfig,
    batch_size: Option<usize>,
}

impl<S: ?Sized> Clone for Repository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hook: self.hook.clone(),
            retry: self.retry.clone(),
            batch_size: self.batch_size,
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for Repository<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("retry", &self.retry)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl<S> Repository<S>
where
    S: DocumentStore + ?Sized,
{
    /// Creates a repository with no accounting hook and the default retry policy.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            hook: NoopHook::shared(),
            retry: RetryConfig::default(),
            batch_size: None,
        }
    }

    /// Reports every store call to `hook`.
    pub fn with_hook(mut self, hook: SharedHook) -> Self {
        self.hook = hook;
        self
    }

    /// Sets the retry policy of [`update_with`](Self::update_with).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Caps the group size of batched writes below the store's maximum.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns a pager over the same store and hook.
    pub fn pager(&self) -> EntityPager<S> {
        EntityPager::new(self.store.clone()).with_hook(self.hook.clone())
    }

    fn group_size(&self) -> usize {
        let max = self.store.max_batch_size();
        self.batch_size.map_or(max, |size| size.min(max))
    }

    /// Creates one entity, stamping its id and timestamps.
    #[tracing::instrument(skip_all, target = TRACING_TARGET_REPOSITORY)]
    pub async fn create(&self, draft: NewEntity) -> Result<Entity> {
        let entity = draft.into_entity(Timestamp::now())?;
        self.store.create_batch(vec![entity.clone()]).await?;
        self.hook.record(Operation::Write, 1);

        tracing::debug!(
            target: TRACING_TARGET_REPOSITORY,
            id = %entity.id,
            "Entity created"
        );
        Ok(entity)
    }

    /// Fetches one entity by id.
    pub async fn get(&self, id: &str) -> Result<Option<Entity>> {
        let entity = self.store.get_by_id(id).await?;
        self.hook.record(Operation::Read, 1);
        Ok(entity)
    }

    /// Shallow-merges `patch` into an existing entity and refreshes `updatedAt`.
    ///
    /// `null` values remove attributes; system attributes cannot be patched.
    #[tracing::instrument(skip(self, patch), target = TRACING_TARGET_REPOSITORY)]
    pub async fn update(&self, id: &str, patch: Map<String, Value>) -> Result<Entity> {
        let mut entity = self
            .get(id)
            .await?
            .ok_or_else(|| pagewalk_core::Error::not_found(id))?;

        entity.merge(patch);
        entity.touch(next_write_time(entity.updated_at));
        self.store.update_batch(vec![entity.clone()]).await?;
        self.hook.record(Operation::Write, 1);

        Ok(entity)
    }

    /// Deletes one entity. Deleting a missing id succeeds.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_REPOSITORY)]
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete_batch(vec![id.to_owned()]).await?;
        self.hook.record(Operation::Delete, 1);
        Ok(())
    }

    /// Creates many entities in concurrently written groups.
    ///
    /// Returns the created entities in input order.
    ///
    /// # Errors
    ///
    /// Invalid drafts fail before anything is written. A group that fails
    /// leaves the other groups committed and yields [`Error::PartialBatch`].
    pub async fn create_many(&self, drafts: Vec<NewEntity>) -> Result<Vec<Entity>> {
        let now = Timestamp::now();
        let entities = drafts
            .into_iter()
            .map(|draft| draft.into_entity(now))
            .collect::<pagewalk_core::Result<Vec<_>>>()?;

        write_groups(
            "create",
            Operation::Write,
            entities.clone(),
            self.group_size(),
            &self.hook,
            |group| self.store.create_batch(group),
        )
        .await?;

        Ok(entities)
    }

    /// Replaces many existing entities in concurrently written groups,
    /// refreshing their `updatedAt`.
    ///
    /// Returns the number of entities written.
    pub async fn update_many(&self, entities: Vec<Entity>) -> Result<usize> {
        let entities = entities
            .into_iter()
            .map(|mut entity| {
                entity.touch(next_write_time(entity.updated_at));
                entity
            })
            .collect::<Vec<_>>();

        write_groups(
            "update",
            Operation::Write,
            entities,
            self.group_size(),
            &self.hook,
            |group| self.store.update_batch(group),
        )
        .await
    }

    /// Deletes many entities by id in concurrently written groups.
    ///
    /// Returns the number of ids submitted by committed groups.
    pub async fn delete_many(&self, ids: Vec<String>) -> Result<usize> {
        write_groups(
            "delete",
            Operation::Delete,
            ids,
            self.group_size(),
            &self.hook,
            |group| self.store.delete_batch(group),
        )
        .await
    }

    /// Applies `modify` to the current version of an entity and writes the
    /// result only if nobody wrote the entity in between.
    ///
    /// `modify` returns a patch merged like [`update`](Self::update). It is
    /// called again with the fresh version after every lost write, up to the
    /// retry policy's attempt limit.
    ///
    /// # Errors
    ///
    /// Returns a `Conflict` store error when every attempt lost and
    /// `NotFound` when the entity does not exist.
    #[tracing::instrument(skip(self, modify), target = TRACING_TARGET_REPOSITORY)]
    pub async fn update_with<F>(&self, id: &str, modify: F) -> Result<Entity>
    where
        F: Fn(&Entity) -> Map<String, Value> + Send + Sync,
    {
        let modify = &modify;
        self.retry
            .retry(move |attempt| self.try_update_with(id, modify, attempt))
            .await
    }

    async fn try_update_with<F>(&self, id: &str, modify: &F, attempt: u32) -> Result<Entity>
    where
        F: Fn(&Entity) -> Map<String, Value> + Send + Sync,
    {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| pagewalk_core::Error::not_found(id))?;

        let expected = current.updated_at;
        let patch = modify(&current);
        let mut next = current;
        next.merge(patch);
        next.touch(next_write_time(expected));

        if !self
            .store
            .update_if_unchanged(next.clone(), expected)
            .await?
        {
            tracing::debug!(
                target: TRACING_TARGET_REPOSITORY,
                id,
                attempt = attempt + 1,
                "Conditional write lost to a concurrent update"
            );
            return Err(Error::from(pagewalk_core::Error::conflict(id, attempt + 1)));
        }

        self.hook.record(Operation::Write, 1);
        Ok(next)
    }
}

/// Returns a write time strictly after `previous`.
fn next_write_time(previous: Timestamp) -> Timestamp {
    let now = Timestamp::now();
    if now > previous {
        return now;
    }
    previous
        .checked_add(SignedDuration::from_nanos(1))
        .unwrap_or(previous)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use pagewalk_core::{MemoryStore, OperationCounter, StoreQuery};
    use pagewalk_iter::{Flow, IterationConfig};
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn repo() -> (Repository<MemoryStore>, Arc<OperationCounter>) {
        let counter = Arc::new(OperationCounter::new());
        let repo = Repository::new(Arc::new(MemoryStore::new())).with_hook(counter.clone());
        (repo, counter)
    }

    #[tokio::test]
    async fn create_stamps_system_fields() {
        let (repo, counter) = repo();

        let entity = repo
            .create(NewEntity::new(fields(json!({ "greeting": "hello1", "id": "ignored" }))))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&entity.id).is_ok());
        assert_eq!(entity.created_at, entity.updated_at);
        assert_eq!(entity.field("greeting"), Some(&json!("hello1")));
        assert!(entity.fields.get("id").is_none());
        assert_eq!(repo.get(&entity.id).await.unwrap(), Some(entity));
        assert_eq!(counter.snapshot().writes, 1);
        assert_eq!(counter.snapshot().reads, 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_and_empty_ids() {
        let (repo, _) = repo();
        let draft = NewEntity::default().with_id("fixed");

        repo.create(draft.clone()).await.unwrap();
        let err = repo.create(draft).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store(pagewalk_core::Error::AlreadyExists { .. })
        ));

        let err = repo.create(NewEntity::default().with_id("")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store(pagewalk_core::Error::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn update_merges_and_touches() {
        let (repo, _) = repo();
        let created = repo
            .create(NewEntity::new(fields(json!({ "a": 1, "b": 2 }))))
            .await
            .unwrap();

        let updated = repo
            .update(&created.id, fields(json!({ "a": null, "c": 3 })))
            .await
            .unwrap();

        assert_eq!(updated.fields, fields(json!({ "b": 2, "c": 3 })));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);

        let err = repo.update("missing", Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::Store(pagewalk_core::Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (repo, counter) = repo();
        let created = repo.create(NewEntity::default()).await.unwrap();

        repo.delete(&created.id).await.unwrap();
        repo.delete(&created.id).await.unwrap();

        assert_eq!(repo.get(&created.id).await.unwrap(), None);
        assert_eq!(counter.snapshot().deletes, 2);
    }

    #[tokio::test]
    async fn batches_are_chunked_to_store_limit() {
        let store = Arc::new(MemoryStore::new().with_max_batch_size(3));
        let counter = Arc::new(OperationCounter::new());
        let repo = Repository::new(store.clone()).with_hook(counter.clone());

        let drafts = (0..10)
            .map(|i| NewEntity::new(fields(json!({ "n": i }))))
            .collect();
        let created = repo.create_many(drafts).await.unwrap();

        assert_eq!(created.len(), 10);
        assert_eq!(store.len().await, 10);
        assert_eq!(counter.snapshot().writes, 10);

        let mut ids: Vec<String> = created.iter().map(|e| e.id.clone()).collect();
        assert_eq!(repo.update_many(created).await.unwrap(), 10);

        ids.truncate(7);
        assert_eq!(repo.delete_many(ids).await.unwrap(), 7);
        assert_eq!(store.len().await, 3);
        assert_eq!(counter.snapshot().deletes, 7);
    }

    #[tokio::test]
    async fn failed_group_leaves_others_committed() {
        let store = Arc::new(MemoryStore::new().with_max_batch_size(2));
        let repo = Repository::new(store.clone());
        repo.create(NewEntity::default().with_id("c")).await.unwrap();

        let drafts = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|id| NewEntity::default().with_id(id))
            .collect();
        let err = repo.create_many(drafts).await.unwrap_err();

        match err {
            Error::PartialBatch {
                committed,
                total,
                failed_groups,
                source,
                ..
            } => {
                assert_eq!(committed, 3);
                assert_eq!(total, 5);
                assert_eq!(failed_groups, 1);
                assert!(matches!(source, pagewalk_core::Error::AlreadyExists { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Groups: [a, b], [c, d], [e]; the second is rejected atomically.
        assert!(repo.get("a").await.unwrap().is_some());
        assert!(repo.get("d").await.unwrap().is_none());
        assert!(repo.get("e").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn repository_batch_size_caps_groups() {
        let store = Arc::new(MemoryStore::new().with_max_batch_size(2));
        let repo = Repository::new(store).with_batch_size(10);
        assert_eq!(repo.group_size(), 2);

        let repo = repo.with_batch_size(1);
        assert_eq!(repo.group_size(), 1);
    }

    #[tokio::test]
    async fn update_with_applies_patch() {
        let (repo, _) = repo();
        let created = repo
            .create(NewEntity::new(fields(json!({ "visits": 1 }))))
            .await
            .unwrap();

        let updated = repo
            .update_with(&created.id, |current| {
                let visits = current.field("visits").and_then(Value::as_u64).unwrap_or(0);
                fields(json!({ "visits": visits + 1 }))
            })
            .await
            .unwrap();

        assert_eq!(updated.field("visits"), Some(&json!(2)));
        assert_eq!(repo.get(&created.id).await.unwrap(), Some(updated));
    }

    /// Store whose conditional writes lose the first `contended` times.
    struct ContendedStore {
        inner: MemoryStore,
        contended: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl ContendedStore {
        fn new(contended: usize) -> Self {
            Self {
                inner: MemoryStore::from_entities([Entity::new(
                    "e1",
                    fields(json!({ "visits": 0 })),
                    Timestamp::UNIX_EPOCH,
                )]),
                contended: AtomicUsize::new(contended),
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for ContendedStore {
        async fn query(&self, query: &StoreQuery) -> pagewalk_core::Result<Vec<Entity>> {
            self.inner.query(query).await
        }

        async fn get_by_id(&self, id: &str) -> pagewalk_core::Result<Option<Entity>> {
            self.inner.get_by_id(id).await
        }

        async fn create_batch(&self, entities: Vec<Entity>) -> pagewalk_core::Result<()> {
            self.inner.create_batch(entities).await
        }

        async fn update_batch(&self, entities: Vec<Entity>) -> pagewalk_core::Result<()> {
            self.inner.update_batch(entities).await
        }

        async fn delete_batch(&self, ids: Vec<String>) -> pagewalk_core::Result<()> {
            self.inner.delete_batch(ids).await
        }

        async fn update_if_unchanged(
            &self,
            entity: Entity,
            expected_updated_at: Timestamp,
        ) -> pagewalk_core::Result<bool> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.contended.load(Ordering::SeqCst);
            if remaining > 0 {
                self.contended.store(remaining - 1, Ordering::SeqCst);
                return Ok(false);
            }
            self.inner.update_if_unchanged(entity, expected_updated_at).await
        }
    }

    #[tokio::test]
    async fn update_with_retries_lost_writes() {
        let store = Arc::new(ContendedStore::new(2));
        let repo = Repository::new(store.clone()).with_retry(RetryConfig::new(3, Duration::ZERO));

        let updated = repo
            .update_with("e1", |_| fields(json!({ "visits": 1 })))
            .await
            .unwrap();

        assert_eq!(updated.field("visits"), Some(&json!(1)));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn update_with_gives_up_after_retry_limit() {
        let store = Arc::new(ContendedStore::new(usize::MAX));
        let repo = Repository::new(store.clone()).with_retry(RetryConfig::new(2, Duration::ZERO));

        let err = repo
            .update_with("e1", |_| fields(json!({ "visits": 1 })))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Store(pagewalk_core::Error::Conflict { attempts: 3, .. })
        ));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn update_with_missing_entity_is_not_retried() {
        let store = Arc::new(ContendedStore::new(0));
        let repo = Repository::new(store.clone());

        let err = repo.update_with("missing", |_| Map::new()).await.unwrap_err();

        assert!(matches!(err, Error::Store(pagewalk_core::Error::NotFound { .. })));
        assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pager_shares_store_and_hook() {
        let (repo, counter) = repo();
        let drafts = (1..=5)
            .map(|i| NewEntity::new(fields(json!({ "n": i }))))
            .collect();
        repo.create_many(drafts).await.unwrap();

        let config = IterationConfig::builder()
            .with_page_size(2usize)
            .build()
            .unwrap();
        let result = repo
            .pager()
            .iterate(&config, |_entity: Arc<Entity>| async { Ok(Flow::Continue) })
            .await
            .unwrap();

        assert_eq!(result.total_number_of_results(), 5);
        assert!(result.finished());
        assert_eq!(counter.snapshot().reads, 5);
    }
}
