//! Loading the input collection and walking it.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use pagewalk_core::{DocumentStore, Entity};
use pagewalk_iter::{ConsumerResult, EntityPager, Flow, IterationConfig, IterationResult};
use pagewalk_repo::{NewEntity, Repository};

use crate::TRACING_TARGET_WALK;

/// Outcome of a walk.
#[derive(Debug)]
pub(crate) struct WalkSummary {
    /// Result reported by the pager.
    pub result: IterationResult,
    /// Entities written to the output.
    pub emitted: u64,
}

/// Loads a JSON array of records from `path` into the repository.
///
/// Returns the number of created entities.
pub(crate) async fn load<S>(repo: &Repository<S>, path: &Path) -> anyhow::Result<usize>
where
    S: DocumentStore + ?Sized,
{
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read input file '{}'", path.display()))?;

    let drafts: Vec<NewEntity> = serde_json::from_str(&raw)
        .with_context(|| format!("input file '{}' is not a JSON array of objects", path.display()))?;

    let created = repo
        .create_many(drafts)
        .await
        .context("failed to load records")?;

    tracing::info!(
        target: TRACING_TARGET_WALK,
        path = %path.display(),
        entities = created.len(),
        "Input loaded"
    );

    Ok(created.len())
}

/// Walks the collection, writing each visited entity as one JSON line to `out`.
///
/// With a `limit`, entities past the limit are skipped and the walk ends
/// after the page holding the last emitted entity.
pub(crate) async fn walk<S, W>(
    pager: &EntityPager<S>,
    config: &IterationConfig,
    limit: Option<u64>,
    out: W,
) -> anyhow::Result<WalkSummary>
where
    S: DocumentStore + ?Sized,
    W: Write + Send,
{
    let out = Mutex::new(out);
    let emitted = AtomicU64::new(0);

    let result = {
        let (out, emitted) = (&out, &emitted);
        pager
            .iterate(config, move |entity: Arc<Entity>| async move {
                emit(out, emitted, limit, &entity)
            })
            .await
    };

    let result = result.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_WALK,
            total = err.total_number_of_results(),
            last_processed_id = ?err.last_processed_id(),
            "Walk failed, resume with --start-after the last processed id"
        );
        anyhow::Error::new(err)
    })?;

    let mut out = out
        .into_inner()
        .map_err(|_| anyhow::anyhow!("output lock poisoned"))?;
    out.flush().context("failed to flush output")?;

    Ok(WalkSummary {
        result,
        emitted: emitted.into_inner(),
    })
}

/// Writes one entity unless the limit is already reached.
fn emit<W>(
    out: &Mutex<W>,
    emitted: &AtomicU64,
    limit: Option<u64>,
    entity: &Entity,
) -> ConsumerResult
where
    W: Write,
{
    let reserved = emitted.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| match limit {
        Some(limit) if count >= limit => None,
        _ => Some(count + 1),
    });
    let Ok(previous) = reserved else {
        return Ok(Flow::Stop);
    };

    let line = serde_json::to_string(entity)?;
    let mut out = out.lock().map_err(|_| "output lock poisoned")?;
    writeln!(out, "{line}")?;

    Ok(Flow::stop_if(limit == Some(previous + 1)))
}
