//! Query configuration: filters, sort keys and the id tiebreak.

use std::str::FromStr;

use clap::Args;
use pagewalk_core::{Comparison, Direction, Predicate, SortKey};
use pagewalk_iter::QueryDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TRACING_TARGET_CONFIG;

/// Malformed `--filter` or `--sort` argument.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgError {
    /// The argument does not have the expected shape.
    #[error("expected {expected}, got '{input}'")]
    Malformed {
        expected: &'static str,
        input: String,
    },

    /// The field name is empty.
    #[error("empty field name in '{0}'")]
    EmptyField(String),

    /// The comparison operator is unknown.
    #[error("unknown comparison operator '{0}'")]
    UnknownOperator(String),

    /// The sort direction is unknown.
    #[error("unknown sort direction '{0}', expected 'asc' or 'desc'")]
    UnknownDirection(String),
}

/// Parses a `FIELD:OP:VALUE` filter.
///
/// `VALUE` is read as JSON when it parses, otherwise as a plain string, so
/// `n:gt:3` compares against a number and `greeting:eq:hello1` against a string.
pub fn parse_filter(input: &str) -> Result<Predicate, ArgError> {
    let mut parts = input.splitn(3, ':');
    let (Some(field), Some(op), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ArgError::Malformed {
            expected: "FIELD:OP:VALUE",
            input: input.to_owned(),
        });
    };

    if field.is_empty() {
        return Err(ArgError::EmptyField(input.to_owned()));
    }

    let op = Comparison::from_str(op).map_err(|_| ArgError::UnknownOperator(op.to_owned()))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));

    Ok(Predicate::new(field, op, value))
}

/// Parses a `FIELD[:asc|desc]` sort key.
pub fn parse_sort(input: &str) -> Result<SortKey, ArgError> {
    let (field, direction) = match input.rsplit_once(':') {
        Some((field, direction)) => {
            let direction = Direction::from_str(direction)
                .map_err(|_| ArgError::UnknownDirection(direction.to_owned()))?;
            (field, direction)
        }
        None => (input, Direction::Asc),
    };

    if field.is_empty() {
        return Err(ArgError::EmptyField(input.to_owned()));
    }

    Ok(SortKey::new(field, direction))
}

/// Query configuration.
///
/// # Environment Variables
///
/// - `PAGEWALK_FILTER` - Semicolon-separated filters
/// - `PAGEWALK_SORT` - Semicolon-separated sort keys
/// - `PAGEWALK_NO_ID_TIEBREAK` - Disable the implicit `id` sort key
#[derive(Debug, Clone, Default, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct QueryConfig {
    /// Filter as FIELD:OP:VALUE; repeat to AND several filters.
    #[arg(long = "filter", env = "PAGEWALK_FILTER", value_delimiter = ';', value_parser = parse_filter)]
    #[serde(default)]
    pub filters: Vec<Predicate>,

    /// Sort key as FIELD[:asc|desc]; the first key is primary.
    #[arg(long = "sort", env = "PAGEWALK_SORT", value_delimiter = ';', value_parser = parse_sort)]
    #[serde(default)]
    pub sort: Vec<SortKey>,

    /// Do not append `id` to the sort keys.
    ///
    /// Entities tying with a page boundary on every sort key are then skipped.
    #[arg(long, env = "PAGEWALK_NO_ID_TIEBREAK")]
    #[serde(default)]
    pub no_id_tiebreak: bool,
}

impl QueryConfig {
    /// Builds the query descriptor of the walk.
    pub fn descriptor(&self) -> QueryDescriptor {
        let descriptor = QueryDescriptor::new()
            .with_predicates(self.filters.iter().cloned())
            .with_sort(self.sort.iter().cloned());

        if self.no_id_tiebreak {
            descriptor.without_id_tiebreak()
        } else {
            descriptor
        }
    }

    /// Logs the query configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            filters = self.filters.len(),
            sort = ?self.sort.iter().map(|key| format!("{}:{}", key.field, key.direction)).collect::<Vec<_>>(),
            id_tiebreak = !self.no_id_tiebreak,
            "Query configuration"
        );
    }
}
