//! Structured error types for the indexing, selector, and xref surfaces.
//!
//! Library code returns these `thiserror` enums so callers can match on
//! failure kind; the CLI glue layer wraps them in `anyhow::Result` and adds
//! path/operation context on the way out.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering, parsing, or persisting an [`crate::model::Index`].
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: parse failed: {message}")]
    ParseFailure { path: PathBuf, message: String },

    #[error("index build cancelled")]
    Cancelled,

    #[error("index schema mismatch: expected version {expected}, found {found}")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised while parsing a structural selector.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("invalid selector `{input}`: {message}")]
    InvalidSelector { input: String, message: String },
}

/// Errors raised while planning a structural rename.
#[derive(Debug, Error)]
pub enum RenamePlanError {
    #[error("selector `{selector}` matched {count} symbols, expected exactly one")]
    AmbiguousTarget { selector: String, count: usize },

    #[error("selector `{selector}` matched no symbols")]
    NoTarget { selector: String },

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Errors raised while loading a language grammar capability.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("failed to compile tag query for `{language}`: {source}")]
    InvalidQuery {
        language: &'static str,
        #[source]
        source: tree_sitter::QueryError,
    },
}
