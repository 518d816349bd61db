//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── input: PathBuf               # JSON array of records to load
//! ├── query: QueryConfig           # Filters, sort keys, id tiebreak
//! └── iteration: IterationArgs     # Page size, cursor, fan-out, limit
//! ```
//!
//! All configuration can be provided via CLI arguments or `PAGEWALK_*`
//! environment variables. Use `--help` to see all available options.

mod iteration;
mod query;

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
pub use iteration::IterationArgs;
use pagewalk_iter::IterationConfig;
pub use query::QueryConfig;
use serde::{Deserialize, Serialize};

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "pagewalk")]
#[command(about = "Walk a JSON collection page by page with cursor-based iteration")]
#[command(version)]
pub struct Cli {
    /// Path to a JSON file holding an array of records.
    ///
    /// An `id` member picks the record id; otherwise a UUID v7 is generated.
    #[arg(short, long, env = "PAGEWALK_INPUT")]
    pub input: PathBuf,

    /// Filters, ordering and tiebreak.
    #[clap(flatten)]
    pub query: QueryConfig,

    /// Paging, resumption and fan-out.
    #[clap(flatten)]
    pub iteration: IterationArgs,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// This is the preferred way to initialize the CLI configuration as it ensures
    /// .env files are loaded before clap parses arguments, allowing environment
    /// variables from .env to be used as defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.iteration
            .validate()
            .context("invalid iteration configuration")?;
        Ok(())
    }

    /// Builds the configuration of the iteration run.
    pub fn iteration_config(&self) -> anyhow::Result<IterationConfig> {
        IterationConfig::builder()
            .with_query(self.query.descriptor())
            .with_page_size(self.iteration.page_size)
            .with_cursor(self.iteration.start_after.clone())
            .with_max_concurrency(self.iteration.max_concurrency)
            .build()
            .context("invalid iteration configuration")
    }

    /// Logs configuration and build information.
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            input = %self.input.display(),
            "Input configuration"
        );
        self.query.log();
        self.iteration.log();
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pagewalk_core::{Comparison, Direction};

    use super::*;

    #[test]
    fn parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "pagewalk",
            "--input",
            "records.json",
            "--filter",
            "n:gt:3",
            "--filter",
            "kind:in:[\"a\",\"b\"]",
            "--sort",
            "n:desc",
            "--sort",
            "greeting",
            "--page-size",
            "25",
            "--start-after",
            "e07",
            "--no-id-tiebreak",
            "--max-concurrency",
            "4",
            "--limit",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.input, PathBuf::from("records.json"));
        assert_eq!(cli.query.filters.len(), 2);
        assert_eq!(cli.query.filters[1].op, Comparison::In);
        assert_eq!(cli.query.sort[0].direction, Direction::Desc);
        assert!(cli.query.no_id_tiebreak);
        assert_eq!(cli.iteration.limit, Some(10));

        let config = cli.iteration_config().unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.start_after.as_deref(), Some("e07"));
        assert_eq!(config.max_concurrency.map(|n| n.get()), Some(4));
        assert!(!config.query.id_tiebreak());
        assert_eq!(config.query.sort_keys().len(), 2);
    }

    #[test]
    fn applies_defaults() {
        let cli = Cli::try_parse_from(["pagewalk", "-i", "records.json"]).unwrap();
        cli.validate().unwrap();

        let config = cli.iteration_config().unwrap();
        assert_eq!(config.page_size, pagewalk_iter::DEFAULT_PAGE_SIZE);
        assert!(config.start_after.is_none());
        assert!(config.max_concurrency.is_none());
        assert!(config.query.id_tiebreak());
    }

    #[test]
    fn rejects_bad_filter() {
        let result = Cli::try_parse_from(["pagewalk", "-i", "x.json", "--filter", "n:about:1"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_page_size() {
        let cli = Cli::try_parse_from(["pagewalk", "-i", "x.json", "--page-size", "0"]).unwrap();
        assert!(cli.validate().is_err());
        assert!(cli.iteration_config().is_err());
    }
}
