#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod telemetry;
mod walk;

use std::io::BufWriter;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use pagewalk_core::{MemoryStore, OperationCounter};
use pagewalk_repo::Repository;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "pagewalk_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "pagewalk_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "pagewalk_cli::config";
pub const TRACING_TARGET_WALK: &str = "pagewalk_cli::walk";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::debug!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = ?error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    telemetry::init_tracing()?;
    cli.log();
    cli.validate()?;

    let config = cli.iteration_config()?;
    let counter = Arc::new(OperationCounter::new());
    let repo = Repository::new(Arc::new(MemoryStore::new())).with_hook(counter.clone());

    walk::load(&repo, &cli.input).await?;

    let out = BufWriter::new(std::io::stdout());
    let summary = walk::walk(&repo.pager(), &config, cli.iteration.limit, out)
        .await
        .context("walk failed")?;

    let operations = counter.snapshot();
    tracing::info!(
        target: TRACING_TARGET_WALK,
        total = summary.result.total_number_of_results(),
        emitted = summary.emitted,
        last_processed_id = ?summary.result.last_processed_id(),
        finished = summary.result.finished(),
        state = %summary.result.state(),
        reads = operations.reads,
        writes = operations.writes,
        "Walk complete"
    );

    Ok(())
}
