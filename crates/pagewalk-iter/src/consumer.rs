//! Consumer traits and control signals.

use std::future::Future;
use std::sync::Arc;

use pagewalk_core::{BoxError, Entity};
use serde::{Deserialize, Serialize};

use crate::Page;

/// Signal returned by a consumer after handling a page or an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// Keep iterating.
    #[default]
    Continue,
    /// End the iteration after the current page.
    Stop,
}

impl Flow {
    /// Returns [`Flow::Stop`] when `stop` is true.
    pub fn stop_if(stop: bool) -> Self {
        if stop { Self::Stop } else { Self::Continue }
    }

    /// Returns whether this is [`Flow::Stop`].
    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Outcome of a consumer call.
pub type ConsumerResult = Result<Flow, BoxError>;

/// Handles one page at a time.
///
/// Any `FnMut(Page) -> impl Future<Output = ConsumerResult>` closure implements this trait.
pub trait PageConsumer: Send {
    /// Handles a page and decides whether iteration continues.
    fn consume(&mut self, page: Page) -> impl Future<Output = ConsumerResult> + Send;
}

impl<F, Fut> PageConsumer for F
where
    F: FnMut(Page) -> Fut + Send,
    Fut: Future<Output = ConsumerResult> + Send,
{
    fn consume(&mut self, page: Page) -> impl Future<Output = ConsumerResult> + Send {
        self(page)
    }
}

/// Handles one entity; invoked concurrently for all entities of a page.
///
/// The entity is shared with the error handler, hence the [`Arc`].
/// Any `Fn(Arc<Entity>) -> impl Future<Output = ConsumerResult>` closure
/// implements this trait.
pub trait EntityConsumer: Send + Sync {
    /// Handles an entity and decides whether iteration continues.
    fn consume(&self, entity: Arc<Entity>) -> impl Future<Output = ConsumerResult> + Send;
}

impl<F, Fut> EntityConsumer for F
where
    F: Fn(Arc<Entity>) -> Fut + Send + Sync,
    Fut: Future<Output = ConsumerResult> + Send,
{
    fn consume(&self, entity: Arc<Entity>) -> impl Future<Output = ConsumerResult> + Send {
        self(entity)
    }
}

/// Decision taken by an [`ErrorHandler`] for a failed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDecision {
    /// Treat the entity as handled and keep iterating.
    Continue,
    /// Propagate the error and fail the iteration.
    Abort,
}

/// Decides what happens when an entity consumer fails.
///
/// Any `Fn(&BoxError, &Entity) -> ErrorDecision` closure implements this trait.
pub trait ErrorHandler: Send + Sync {
    /// Inspects the failure of `entity` and returns a decision.
    fn handle(&self, error: &BoxError, entity: &Entity) -> ErrorDecision;
}

impl<F> ErrorHandler for F
where
    F: Fn(&BoxError, &Entity) -> ErrorDecision + Send + Sync,
{
    fn handle(&self, error: &BoxError, entity: &Entity) -> ErrorDecision {
        self(error, entity)
    }
}

/// Handler that aborts on the first entity failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFast;

impl ErrorHandler for FailFast {
    fn handle(&self, _error: &BoxError, _entity: &Entity) -> ErrorDecision {
        ErrorDecision::Abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_if_maps_booleans() {
        assert_eq!(Flow::stop_if(true), Flow::Stop);
        assert_eq!(Flow::stop_if(false), Flow::Continue);
        assert!(Flow::Stop.is_stop());
        assert!(!Flow::default().is_stop());
    }
}
