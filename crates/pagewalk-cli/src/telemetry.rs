//! Log output of the binary.
//!
//! Stdout carries the emitted entities, so every log line goes to stderr.

use std::io::{self, IsTerminal};

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset.
///
/// Run summaries from every pagewalk crate at `info`, anything else at `warn`.
const DEFAULT_FILTER: &str = "warn,pagewalk_cli=info,pagewalk_iter=info,pagewalk_repo=info,pagewalk_core=info";

/// Installs the global subscriber.
///
/// ```bash
/// RUST_LOG=pagewalk_iter::driver=debug pagewalk --input records.json
/// ```
pub(crate) fn init_tracing() -> anyhow::Result<()> {
    let filter = env_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())?;
    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to initialize tracing")
}

/// Parses `directives`, falling back to [`DEFAULT_FILTER`] when absent or blank.
fn env_filter(directives: Option<&str>) -> anyhow::Result<EnvFilter> {
    let directives = directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_FILTER);

    EnvFilter::try_new(directives).with_context(|| format!("invalid log filter '{directives}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_filter() {
        let filter = env_filter(None).unwrap();
        assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());

        let filter = env_filter(Some("  ")).unwrap();
        assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
    }

    #[test]
    fn uses_given_directives() {
        let filter = env_filter(Some("pagewalk_iter=debug")).unwrap();
        assert!(filter.to_string().contains("pagewalk_iter=debug"));
    }

    #[test]
    fn rejects_malformed_directives() {
        let err = env_filter(Some("pagewalk_iter=loud")).unwrap_err();
        assert!(err.to_string().contains("invalid log filter"));
    }
}
