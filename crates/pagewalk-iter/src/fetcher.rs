//! Single-page fetches against a document store.

use std::sync::Arc;

use pagewalk_core::{DocumentStore, NoopHook, Operation, SharedHook};

use crate::{Error, Page, QueryDescriptor, Result, TRACING_TARGET_FETCHER};

/// Fetches exactly one page of entities after a cursor.
pub struct PagedFetcher<S: ?Sized> {
    store: Arc<S>,
    hook: SharedHook,
}

impl<S: ?Sized> Clone for PagedFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hook: self.hook.clone(),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for PagedFetcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedFetcher").finish_non_exhaustive()
    }
}

impl<S> PagedFetcher<S>
where
    S: DocumentStore + ?Sized,
{
    /// Creates a fetcher over `store` with no accounting hook.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            hook: NoopHook::shared(),
        }
    }

    /// Reports every fetch to `hook`.
    pub fn with_hook(mut self, hook: SharedHook) -> Self {
        self.hook = hook;
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the accounting hook.
    pub fn hook(&self) -> &SharedHook {
        &self.hook
    }

    /// Fetches up to `page_size` entities strictly after `after_id`.
    ///
    /// `after_id` is resolved through the store's get-by-id; an id that no
    /// longer resolves restarts from the beginning of the result set. Each call
    /// reports one read of `max(len, 1)` entities to the hook.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero page size and [`Error::Fetch`] when
    /// the store fails. Store failures are never retried here.
    #[tracing::instrument(skip(self, descriptor), target = TRACING_TARGET_FETCHER)]
    pub async fn fetch_page(
        &self,
        descriptor: &QueryDescriptor,
        page_size: usize,
        after_id: Option<&str>,
    ) -> Result<Page> {
        if page_size == 0 {
            return Err(Error::config("page size must be a positive integer"));
        }

        let marker = match after_id {
            Some(id) => {
                let marker = self.store.get_by_id(id).await?;
                if marker.is_none() {
                    tracing::warn!(
                        target: TRACING_TARGET_FETCHER,
                        cursor = %id,
                        "Cursor entity not found, starting from the beginning"
                    );
                }
                marker
            }
            None => None,
        };

        let query = descriptor.to_store_query(page_size, marker);
        let entities = self.store.query(&query).await?;

        let reads = entities.len().max(1) as u64;
        self.hook.record(Operation::Read, reads);

        let page = Page::new(entities);
        tracing::debug!(
            target: TRACING_TARGET_FETCHER,
            fetched = page.len(),
            next_cursor = page.next_cursor(),
            "Fetched page"
        );

        Ok(page)
    }
}
