//! Sequential page driver.

use std::future::Future;
use std::sync::Arc;

use pagewalk_core::{BoxError, DocumentStore, Entity, SharedHook};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    ConsumerResult, Error, ErrorDecision, FanOut, Flow, IterationConfig, IterationError, Page,
    PageConsumer, PagedFetcher, QueryDescriptor, Result, TRACING_TARGET_DRIVER,
};

/// Lifecycle state of an iteration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IterationState {
    /// Pages are still being fetched and consumed.
    Running,
    /// A short or empty page was reached.
    Exhausted,
    /// The consumer asked to stop.
    EarlyExit,
    /// A fetch or an unhandled consumer error ended the run.
    Failed,
}

impl IterationState {
    /// Returns whether the run can no longer make progress.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Summary of a completed iteration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationResult {
    total_number_of_results: u64,
    last_processed_id: Option<String>,
    finished: bool,
    state: IterationState,
}

impl IterationResult {
    /// Entities handed to the consumer across all pages.
    pub fn total_number_of_results(&self) -> u64 {
        self.total_number_of_results
    }

    /// Id of the last entity of the last consumed page.
    ///
    /// Equals the start cursor when no page was consumed.
    pub fn last_processed_id(&self) -> Option<&str> {
        self.last_processed_id.as_deref()
    }

    /// Whether the result set was exhausted.
    ///
    /// Also true after an early exit on the final, short page.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Terminal state of the run.
    pub fn state(&self) -> IterationState {
        self.state
    }
}

/// Walks every entity matching a query, one page at a time.
///
/// Pages are fetched strictly in sequence: the next fetch starts only after
/// the consumer has settled the previous page. Resuming after the
/// `last_processed_id` of a previous run continues the walk without
/// skipping or repeating entities.
pub struct EntityPager<S: ?Sized> {
    fetcher: PagedFetcher<S>,
}

impl<S: ?Sized> Clone for EntityPager<S> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for EntityPager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityPager")
            .field("fetcher", &self.fetcher)
            .finish()
    }
}

impl<S> EntityPager<S>
where
    S: DocumentStore + ?Sized,
{
    /// Creates a pager over `store` with no accounting hook.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            fetcher: PagedFetcher::new(store),
        }
    }

    /// Reports every page fetch to `hook`.
    pub fn with_hook(mut self, hook: SharedHook) -> Self {
        self.fetcher = self.fetcher.with_hook(hook);
        self
    }

    /// Returns the underlying fetcher.
    pub fn fetcher(&self) -> &PagedFetcher<S> {
        &self.fetcher
    }

    /// Fetches a single page without driving an iteration.
    pub async fn fetch_page(
        &self,
        query: &QueryDescriptor,
        page_size: usize,
        after_id: Option<&str>,
    ) -> Result<Page> {
        self.fetcher.fetch_page(query, page_size, after_id).await
    }

    /// Hands each page to `consumer` until the result set is exhausted or
    /// the consumer returns [`Flow::Stop`].
    pub async fn iterate_batch<F, Fut>(
        &self,
        config: &IterationConfig,
        consumer: F,
    ) -> Result<IterationResult, IterationError>
    where
        F: FnMut(Page) -> Fut + Send,
        Fut: Future<Output = ConsumerResult> + Send,
    {
        self.drive(config, consumer).await
    }

    /// Hands each entity to `consumer`, concurrently within a page.
    ///
    /// The first entity error fails the run.
    pub async fn iterate<F, Fut>(
        &self,
        config: &IterationConfig,
        consumer: F,
    ) -> Result<IterationResult, IterationError>
    where
        F: Fn(Arc<Entity>) -> Fut + Send + Sync,
        Fut: Future<Output = ConsumerResult> + Send,
    {
        let fan_out = FanOut::new(consumer).with_max_concurrency(config.max_concurrency);
        self.drive(config, fan_out).await
    }

    /// Like [`iterate`](Self::iterate), routing entity errors through `handler`.
    pub async fn iterate_with_handler<F, Fut, H>(
        &self,
        config: &IterationConfig,
        consumer: F,
        handler: H,
    ) -> Result<IterationResult, IterationError>
    where
        F: Fn(Arc<Entity>) -> Fut + Send + Sync,
        Fut: Future<Output = ConsumerResult> + Send,
        H: Fn(&BoxError, &Entity) -> ErrorDecision + Send + Sync,
    {
        let fan_out = FanOut::new(consumer)
            .with_handler(handler)
            .with_max_concurrency(config.max_concurrency);
        self.drive(config, fan_out).await
    }

    /// Runs the fetch/consume loop with any [`PageConsumer`].
    ///
    /// # Errors
    ///
    /// Returns an [`IterationError`] carrying the progress made so far when a
    /// fetch fails or the consumer returns an error.
    #[tracing::instrument(
        skip(self, config, consumer),
        fields(page_size = config.page_size, start_after = ?config.start_after),
        target = TRACING_TARGET_DRIVER
    )]
    pub async fn drive<C>(
        &self,
        config: &IterationConfig,
        mut consumer: C,
    ) -> Result<IterationResult, IterationError>
    where
        C: PageConsumer,
    {
        let mut total: u64 = 0;
        let mut last_processed_id = config.start_after.clone();
        let mut pages: u64 = 0;

        let (finished, state) = loop {
            let page = match self
                .fetcher
                .fetch_page(&config.query, config.page_size, last_processed_id.as_deref())
                .await
            {
                Ok(page) => page,
                Err(error) => {
                    tracing::error!(
                        target: TRACING_TARGET_DRIVER,
                        total,
                        last_processed_id = ?last_processed_id,
                        error = %error,
                        "Page fetch failed"
                    );
                    return Err(IterationError::new(total, last_processed_id, error));
                }
            };

            if page.is_empty() {
                break (true, IterationState::Exhausted);
            }

            let finished = page.is_short(config.page_size);
            total += page.len() as u64;
            pages += 1;
            last_processed_id = page.next_cursor().map(str::to_owned);

            tracing::debug!(
                target: TRACING_TARGET_DRIVER,
                page = pages,
                size = page.len(),
                total,
                cursor = ?last_processed_id,
                "Consuming page"
            );

            match consumer.consume(page).await {
                Ok(Flow::Stop) => break (finished, IterationState::EarlyExit),
                Ok(Flow::Continue) if finished => break (true, IterationState::Exhausted),
                Ok(Flow::Continue) => {}
                Err(source) => {
                    tracing::error!(
                        target: TRACING_TARGET_DRIVER,
                        total,
                        last_processed_id = ?last_processed_id,
                        error = %source,
                        "Page consumer failed"
                    );
                    return Err(IterationError::new(
                        total,
                        last_processed_id,
                        Error::Consumer(source),
                    ));
                }
            }
        };

        tracing::info!(
            target: TRACING_TARGET_DRIVER,
            total,
            pages,
            finished,
            state = %state,
            last_processed_id = ?last_processed_id,
            "Iteration complete"
        );

        Ok(IterationResult {
            total_number_of_results: total,
            last_processed_id,
            finished,
            state,
        })
    }
}
