//! Error types for indexing.

use calltrail_core::ParseError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Failures that abort an indexing run.
///
/// Per-file parse failures are not here: they are collected into
/// [`IndexResult::errors`](crate::IndexResult::errors) and the run goes on.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("directory not found: {0}")]
    MissingRoot(PathBuf),

    #[error("failed to {op} config {path}: {source}")]
    ConfigIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A worker could not set up its front end.
    #[error("front end initialisation failed: {0}")]
    FrontEnd(#[from] ParseError),

    #[error("indexing worker panicked")]
    WorkerPanic,
}
