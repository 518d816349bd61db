//! Per-entity fan-out adapter.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use pagewalk_core::Entity;

use crate::{
    ConsumerResult, EntityConsumer, ErrorDecision, ErrorHandler, FailFast, Flow, Page,
    PageConsumer, TRACING_TARGET_FANOUT,
};

/// Adapts a per-entity consumer into a page consumer.
///
/// Every entity of a page is handed to the entity consumer concurrently, on
/// the task driving the iteration, with at most `max_concurrency` futures in
/// flight (the page length when unset). The page settles once all entities
/// have settled and yields [`Flow::Stop`] if any entity asked to stop.
///
/// A failed entity goes to the error handler. [`ErrorDecision::Continue`]
/// counts the entity as handled; [`ErrorDecision::Abort`] propagates the
/// error and drops the entities of the page that are still in flight.
#[derive(Debug, Clone)]
pub struct FanOut<C, H = FailFast> {
    consumer: C,
    handler: H,
    max_concurrency: Option<NonZeroUsize>,
}

impl<C> FanOut<C, FailFast>
where
    C: EntityConsumer,
{
    /// Creates an adapter that fails on the first entity error.
    pub fn new(consumer: C) -> Self {
        Self {
            consumer,
            handler: FailFast,
            max_concurrency: None,
        }
    }
}

impl<C, H> FanOut<C, H>
where
    C: EntityConsumer,
    H: ErrorHandler,
{
    /// Replaces the error handler.
    pub fn with_handler<H2>(self, handler: H2) -> FanOut<C, H2>
    where
        H2: ErrorHandler,
    {
        FanOut {
            consumer: self.consumer,
            handler,
            max_concurrency: self.max_concurrency,
        }
    }

    /// Bounds the number of entities processed at once; `None` means the whole page.
    pub fn with_max_concurrency(mut self, max_concurrency: Option<NonZeroUsize>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    async fn consume_page(&self, page: Page) -> ConsumerResult {
        let limit = self
            .max_concurrency
            .map_or(page.len(), NonZeroUsize::get)
            .max(1);

        let mut settled = stream::iter(page.into_entities())
            .map(|entity| self.settle(Arc::new(entity)))
            .buffer_unordered(limit);

        let mut flow = Flow::Continue;
        while let Some(outcome) = settled.next().await {
            if outcome?.is_stop() {
                flow = Flow::Stop;
            }
        }

        Ok(flow)
    }

    async fn settle(&self, entity: Arc<Entity>) -> ConsumerResult {
        match self.consumer.consume(Arc::clone(&entity)).await {
            Ok(flow) => Ok(flow),
            Err(error) => match self.handler.handle(&error, &entity) {
                ErrorDecision::Continue => {
                    tracing::warn!(
                        target: TRACING_TARGET_FANOUT,
                        entity_id = %entity.id,
                        error = %error,
                        "Entity consumer failed, error handled"
                    );
                    Ok(Flow::Continue)
                }
                ErrorDecision::Abort => {
                    tracing::error!(
                        target: TRACING_TARGET_FANOUT,
                        entity_id = %entity.id,
                        error = %error,
                        "Entity consumer failed, aborting iteration"
                    );
                    Err(error)
                }
            },
        }
    }
}

impl<C, H> PageConsumer for FanOut<C, H>
where
    C: EntityConsumer,
    H: ErrorHandler,
{
    fn consume(&mut self, page: Page) -> impl Future<Output = ConsumerResult> + Send {
        self.consume_page(page)
    }
}
